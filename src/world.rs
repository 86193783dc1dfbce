//! External collaborator abstractions the engine drives.
//!
//! Implementations live outside the engine (a game server's world, its
//! database, its permission plugin). [`crate::memory`] provides in-memory
//! versions for tests and the demo binary.

use std::time::Duration;

use log::debug;
use tokio::sync::oneshot;

use crate::error::{StoreError, SurfaceError};
use crate::geometry::Cuboid;
use crate::structure::{ActorId, BlockDescriptor, Structure, StructureAttribute, StructureId};
use crate::types::BlockPos;

// ---------------------------------------------------------------------------
// Region readiness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionReadiness {
    Ready,
    Unready,
}

/// Reports whether a region is loaded and safe to read and write.
///
/// Must answer promptly; the engine never waits for a region to load.
pub trait RegionGate: Send + Sync {
    fn ensure_ready(&self, region: &Cuboid) -> RegionReadiness;
}

// ---------------------------------------------------------------------------
// Block access
// ---------------------------------------------------------------------------

pub trait BlockSurface: Send + Sync {
    /// Block at `pos`; `None` when the position cannot be read.
    fn get_block(&self, pos: BlockPos) -> Option<BlockDescriptor>;

    fn set_block(&self, pos: BlockPos, block: BlockDescriptor) -> Result<(), SurfaceError>;
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Answer from a [`PermissionOracle`], possibly still in flight.
#[derive(Debug)]
pub enum PermissionAnswer {
    Granted,
    Denied,
    Pending(oneshot::Receiver<bool>),
}

impl PermissionAnswer {
    /// Wait for a pending answer. Timeouts and dropped senders count as denied.
    pub async fn resolve(self, timeout: Duration) -> bool {
        match self {
            PermissionAnswer::Granted => true,
            PermissionAnswer::Denied => false,
            PermissionAnswer::Pending(rx) => match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(allowed)) => allowed,
                Ok(Err(_)) => {
                    debug!("Permission answer dropped before completion");
                    false
                }
                Err(_) => {
                    debug!("Permission answer timed out after {:?}", timeout);
                    false
                }
            },
        }
    }
}

pub trait PermissionOracle: Send + Sync {
    /// Non-owner access to a structure attribute (e.g. a bypass permission).
    fn has_permission(&self, actor: &ActorId, structure: StructureId, attribute: StructureAttribute) -> PermissionAnswer;

    /// Whether the actor may place blocks in `region` (claims, protection).
    fn can_occupy(&self, actor: &ActorId, region: &Cuboid) -> PermissionAnswer;
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

pub trait StructureStore: Send + Sync {
    fn load_structure(&self, id: StructureId) -> Result<Option<Structure>, StoreError>;

    fn commit_structure(&self, structure: &Structure) -> Result<(), StoreError>;
}
