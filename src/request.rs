//! Toggle requests and the builder that validates them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::geometry::Cuboid;
use crate::structure::{ActorId, OpenDirection, StructureId};

// ---------------------------------------------------------------------------
// Cause & action
// ---------------------------------------------------------------------------

/// Why a toggle was requested.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleCause {
    /// A player or other actor asked for it.
    Actor,
    /// Redstone, timers, auto-close.
    Automated,
    /// Continuous motion such as waving flags.
    Perpetual,
    /// Administrative override from the server itself.
    Server,
}

impl ToggleCause {
    /// Administrative causes ignore the structure lock.
    pub fn overrides_lock(self) -> bool {
        matches!(self, ToggleCause::Server)
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    Open,
    Close,
    Toggle,
}

impl ToggleAction {
    /// Whether this action makes sense for a structure in the given state.
    pub fn applies_to(self, is_open: bool) -> bool {
        match self {
            ToggleAction::Open => !is_open,
            ToggleAction::Close => is_open,
            ToggleAction::Toggle => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A validated toggle command. Only [`ToggleRequestBuilder`] creates these.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleRequest {
    structure_id: StructureId,
    cause: ToggleCause,
    action: ToggleAction,
    actor: Option<ActorId>,
    duration: Option<Duration>,
    skip_animation: bool,
    direction: OpenDirection,
    was_open: bool,
    new_cuboid: Cuboid,
}

impl ToggleRequest {
    pub fn structure_id(&self) -> StructureId {
        self.structure_id
    }

    pub fn cause(&self) -> ToggleCause {
        self.cause
    }

    pub fn action(&self) -> ToggleAction {
        self.action
    }

    pub fn actor(&self) -> Option<&ActorId> {
        self.actor.as_ref()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn skip_animation(&self) -> bool {
        self.skip_animation
    }

    /// Movement direction resolved at validation time.
    pub fn direction(&self) -> OpenDirection {
        self.direction
    }

    /// Open state the structure had when the request was validated.
    pub fn was_open(&self) -> bool {
        self.was_open
    }

    /// Bounds the structure will occupy once the toggle completes.
    pub fn new_cuboid(&self) -> Cuboid {
        self.new_cuboid
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[cfg(feature = "server")]
pub use builder::ToggleRequestBuilder;

#[cfg(feature = "server")]
mod builder {
    use super::*;
    use crate::engine::Collaborators;
    use crate::error::ToggleError;
    use crate::geometry::cuboid_after_action;
    use crate::kinds;
    use crate::structure::{Structure, StructureAttribute};
    use crate::types::EngineConfig;
    use log::{debug, error};

    /// Collects the parameters of a toggle and validates them in [`build`].
    ///
    /// [`build`]: ToggleRequestBuilder::build
    pub struct ToggleRequestBuilder<'a> {
        config: &'a EngineConfig,
        collaborators: &'a Collaborators,
        structure_id: StructureId,
        cause: ToggleCause,
        action: ToggleAction,
        actor: Option<ActorId>,
        duration: Option<Duration>,
        skip_animation: bool,
    }

    impl<'a> ToggleRequestBuilder<'a> {
        pub fn new(config: &'a EngineConfig, collaborators: &'a Collaborators, structure_id: StructureId) -> Self {
            Self {
                config,
                collaborators,
                structure_id,
                cause: ToggleCause::Actor,
                action: ToggleAction::Toggle,
                actor: None,
                duration: None,
                skip_animation: false,
            }
        }

        pub fn cause(mut self, cause: ToggleCause) -> Self {
            self.cause = cause;
            self
        }

        pub fn action(mut self, action: ToggleAction) -> Self {
            self.action = action;
            self
        }

        pub fn actor(mut self, actor: impl Into<Option<ActorId>>) -> Self {
            self.actor = actor.into();
            self
        }

        pub fn duration(mut self, duration: impl Into<Option<Duration>>) -> Self {
            self.duration = duration.into();
            self
        }

        pub fn skip_animation(mut self, skip: bool) -> Self {
            self.skip_animation = skip;
            self
        }

        /// Validate and produce the request.
        ///
        /// Checks run in a fixed order and the first failure wins: existence,
        /// kind enabled, lock, actor permission, direction, state consistency.
        /// Nothing is written; only the store and permission oracle are read.
        pub async fn build(self) -> Result<ToggleRequest, ToggleError> {
            let id = self.structure_id;
            let result = self.validate().await;
            if let Err(e) = &result {
                if e.is_validation() {
                    debug!("Toggle of {} rejected: {}", id, e);
                }
            }
            result
        }

        async fn validate(self) -> Result<ToggleRequest, ToggleError> {
            let structure = self
                .collaborators
                .store
                .load_structure(self.structure_id)
                .map_err(|e| {
                    error!("Failed to load structure {}: {}", self.structure_id, e);
                    ToggleError::Fatal(e.to_string())
                })?
                .ok_or(ToggleError::NotFound(self.structure_id))?;

            if !self.config.kind_enabled(structure.kind) {
                return Err(ToggleError::TypeDisabled(structure.kind));
            }

            if structure.locked && !self.cause.overrides_lock() {
                return Err(ToggleError::Locked);
            }

            if let Some(actor) = &self.actor {
                if !may_act(self.config, self.collaborators, actor, &structure, StructureAttribute::Toggle).await {
                    return Err(ToggleError::NoPermission);
                }
            }

            let direction = kinds::movement_direction(&structure)
                .filter(|d| kinds::motion_for(&structure, *d).is_some())
                .ok_or(ToggleError::NoDirection)?;

            if !self.action.applies_to(structure.is_open) {
                return Err(if structure.is_open {
                    ToggleError::AlreadyOpen
                } else {
                    ToggleError::AlreadyClosed
                });
            }

            let new_cuboid = cuboid_after_action(&structure, self.action).ok_or(ToggleError::NoDirection)?;

            Ok(ToggleRequest {
                structure_id: self.structure_id,
                cause: self.cause,
                action: self.action,
                actor: self.actor,
                duration: self.duration,
                skip_animation: self.skip_animation,
                direction,
                was_open: structure.is_open,
                new_cuboid,
            })
        }
    }

    /// Owner tier first, then the permission oracle as a bypass.
    pub(crate) async fn may_act(
        config: &EngineConfig,
        collaborators: &Collaborators,
        actor: &ActorId,
        structure: &Structure,
        attribute: StructureAttribute,
    ) -> bool {
        if structure
            .owner_tier(actor)
            .is_some_and(|t| t.satisfies(attribute.required_tier()))
        {
            return true;
        }
        collaborators
            .permissions
            .has_permission(actor, structure.id, attribute)
            .resolve(Duration::from_millis(config.permission_timeout_ms))
            .await
    }
}

#[cfg(feature = "server")]
pub(crate) use builder::may_act;
