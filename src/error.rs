//! Error taxonomy surfaced by the engine and its collaborators.

use thiserror::Error;

use crate::structure::{StructureId, StructureKind};
use crate::types::BlockPos;

/// Why a toggle did not happen (or did not finish cleanly).
///
/// Validation variants carry no side effects: no claim was taken and the
/// structure is untouched, so the caller may simply retry with other input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToggleError {
    #[error("structure {0} does not exist")]
    NotFound(StructureId),

    #[error("structures of kind {0:?} are disabled")]
    TypeDisabled(StructureKind),

    #[error("structure is locked")]
    Locked,

    #[error("no permission to toggle this structure")]
    NoPermission,

    #[error("no valid open direction for this structure")]
    NoDirection,

    #[error("structure is already open")]
    AlreadyOpen,

    #[error("structure is already closed")]
    AlreadyClosed,

    #[error("structure is busy animating")]
    Busy,

    #[error("structure region is not ready")]
    RegionNotReady,

    #[error("animation vetoed by hook '{0}'")]
    VetoedByHook(String),

    #[error("destination blocked at {0}")]
    Obstructed(BlockPos),

    #[error("structure has {count} blocks, limit is {limit}")]
    BlockLimitExceeded { count: usize, limit: usize },

    #[error("fatal animation failure: {0}")]
    Fatal(String),
}

impl ToggleError {
    /// Plain request-validation outcomes; expected, never logged as failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ToggleError::NotFound(_)
                | ToggleError::TypeDisabled(_)
                | ToggleError::Locked
                | ToggleError::NoPermission
                | ToggleError::NoDirection
                | ToggleError::AlreadyOpen
                | ToggleError::AlreadyClosed
        )
    }

    /// Conditions that may clear on their own if the caller tries again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToggleError::Busy | ToggleError::RegionNotReady)
    }
}

/// Failure to parse or evaluate a movement formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("formula produced a non-finite value")]
    NonFinite,
}

/// Block write surface failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    #[error("position {0} is in an unloaded region")]
    Unloaded(BlockPos),

    #[error("block write rejected at {pos}: {reason}")]
    Rejected { pos: BlockPos, reason: String },
}

/// Block writes that failed while applying a layout. The remaining writes
/// of that layout were still attempted.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} block write(s) failed{}", .failures.len(), first_failure(.failures))]
pub struct LayoutError {
    pub failures: Vec<SurfaceError>,
}

impl LayoutError {
    /// Every failure was an unloaded position.
    pub fn all_unloaded(&self) -> bool {
        self.failures.iter().all(|e| matches!(e, SurfaceError::Unloaded(_)))
    }

    /// Positions whose write failed.
    pub fn positions(&self) -> Vec<BlockPos> {
        self.failures
            .iter()
            .map(|e| match e {
                SurfaceError::Unloaded(pos) => *pos,
                SurfaceError::Rejected { pos, .. } => *pos,
            })
            .collect()
    }
}

fn first_failure(failures: &[SurfaceError]) -> String {
    failures.first().map(|e| format!(", first: {}", e)).unwrap_or_default()
}

/// Persistence store failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("structure store unavailable: {0}")]
    Unavailable(String),

    #[error("commit rejected for structure {id}: {reason}")]
    CommitRejected { id: StructureId, reason: String },
}
