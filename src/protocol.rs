//! Observer-facing animation events.
//!
//! Every payload handed to an [`AnimationHook`](crate::hooks::AnimationHook)
//! is defined here, so observers (sound, highlighting, remote viewers) can
//! depend on one serializable vocabulary.
//!
//! ## Lifecycle
//!
//! | Stage      | Payload               | Can veto |
//! |------------|-----------------------|----------|
//! | prepare    | [`AnimationPrepared`] | yes      |
//! | start      | [`AnimationStarted`]  | no       |
//! | step       | [`AnimationProgress`] | no       |
//! | end        | [`AnimationEnded`]    | no       |
//!
//! ## Design rules
//!
//! 1. Every struct is `Serialize + Deserialize` with snake_case JSON.
//! 2. Block lists are never sent; observers get bounds and counts.
//! 3. Every event carries the structure id and the step (`frame`) it
//!    was produced at.

use serde::{Deserialize, Serialize};

use crate::geometry::Cuboid;
use crate::request::{ToggleAction, ToggleCause};
use crate::structure::{OpenDirection, StructureId, StructureKind};

// ---------------------------------------------------------------------------
// Common envelope
// ---------------------------------------------------------------------------

/// Every event is wrapped in this envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureEvent<T> {
    pub structure_id: StructureId,
    /// Animation step the event belongs to; 0 before the first step.
    pub frame: u32,
    pub payload: T,
}

impl<T> StructureEvent<T> {
    pub fn new(structure_id: StructureId, frame: u32, payload: T) -> Self {
        Self {
            structure_id,
            frame,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Sent before anything moves; hooks may decline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationPrepared {
    pub kind: StructureKind,
    pub cause: ToggleCause,
    pub action: ToggleAction,
    pub direction: OpenDirection,
    pub block_count: usize,
    pub from: Cuboid,
    pub to: Cuboid,
    /// Planned running steps; 0 when the animation is skipped.
    pub total_steps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationStarted {
    pub total_steps: u32,
    /// Step cadence in milliseconds.
    pub step_ms: u64,
}

/// Periodic update while running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationProgress {
    pub step: u32,
    pub total_steps: u32,
}

/// How an animation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every step ran.
    Completed,
    /// The request asked to skip animating.
    Skipped,
    /// `force_stop_all` cut the animation short.
    ForceStopped,
    /// The caller's duration elapsed before all steps ran.
    DeadlineReached,
    /// Moved blocks were restored; nothing was committed.
    Aborted,
    /// Finalizing failed; blocks restored, nothing committed.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationEnded {
    pub reason: EndReason,
    pub committed: bool,
    pub steps_run: u32,
    pub final_cuboid: Cuboid,
    /// Blocks whose movement formula failed at least once.
    pub formula_faults: usize,
}
