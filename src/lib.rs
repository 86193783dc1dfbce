//! Animated Structures Engine
//!
//! Moves multi-block structures (doors, drawbridges, portcullises,
//! elevators, sliding doors, flags) through validated, timed animations
//! while the rest of the world keeps running.
//!
//! ## Architecture
//!
//! ```text
//! Engine  (engine.rs)            ← context: config, registry, hooks, collaborators
//!   ├── ToggleRequestBuilder  (request.rs)   ← ordered validation
//!   ├── ActivityRegistry      (registry.rs)  ← one claim per structure
//!   ├── HookDispatcher        (hooks.rs)     ← prepare / start / step / end
//!   └── Animator              (animator.rs)  ← Preparing → Running → Finalizing → Done
//!         ├── Trajectory      (trajectory.rs)
//!         └── geometry kernel (geometry.rs, kinds.rs, formula.rs)
//! ```
//!
//! The world, persistence and permission systems are injected through the
//! traits in [`world`]; [`memory`] has in-memory implementations.

// Geometry kernel and data types are always available (no server feature needed).
pub mod error;
pub mod formula;
pub mod geometry;
pub mod kinds;
pub mod protocol;
pub mod request;
pub mod structure;
pub mod trajectory;
pub mod types;

// The async engine requires the `server` feature.
#[cfg(feature = "server")]
pub mod animator;
#[cfg(feature = "server")]
pub mod engine;
#[cfg(feature = "server")]
pub mod hooks;
#[cfg(feature = "server")]
pub mod memory;
#[cfg(feature = "server")]
pub mod registry;
#[cfg(feature = "server")]
pub mod world;

// Convenience re-exports (server only)
#[cfg(feature = "server")]
pub use animator::{AnimationReport, AnimationState};
#[cfg(feature = "server")]
pub use engine::{AnimationHandle, Collaborators, Engine, ToggleOutcome};
#[cfg(feature = "server")]
pub use hooks::{AnimationHook, HookDispatcher};
#[cfg(feature = "server")]
pub use registry::ActivityRegistry;
#[cfg(feature = "server")]
pub use request::ToggleRequestBuilder;
pub use error::{FormulaError, ToggleError};
pub use geometry::{compute_cuboid_after_action, rotate_around_axis, Cuboid};
pub use request::{ToggleAction, ToggleCause, ToggleRequest};
pub use structure::{ActorId, OpenDirection, Structure, StructureId, StructureKind, StructureSnapshot};
pub use types::{Axis, BlockPos, EngineConfig, EngineStats, Vec3};
