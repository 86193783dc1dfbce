//! Engine – the explicitly constructed context that owns the activity
//! registry, hook dispatcher, configuration and injected collaborators.
//!
//! ```text
//! Engine::request(id)...build()   validate (read-only)
//!   └── Engine::submit_toggle     claim → Animator::prepare → spawn
//!         └── Animator::run       running steps → finalize → release → end hooks
//! ```

use log::{debug, info};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::animator::{AnimationReport, Animator};
use crate::error::ToggleError;
use crate::hooks::{AnimationHook, HookDispatcher};
use crate::registry::ActivityRegistry;
use crate::request::{may_act, ToggleAction, ToggleCause, ToggleRequest, ToggleRequestBuilder};
use crate::structure::{ActorId, Structure, StructureAttribute, StructureId};
use crate::types::{EngineConfig, EngineStats};
use crate::world::{BlockSurface, PermissionOracle, RegionGate, StructureStore};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The narrow external interfaces the engine depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn StructureStore>,
    pub surface: Arc<dyn BlockSurface>,
    pub gate: Arc<dyn RegionGate>,
    pub permissions: Arc<dyn PermissionOracle>,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct StatsCounters {
    pub started: AtomicU64,
    pub completed: AtomicU64,
    pub aborted: AtomicU64,
    pub steps: AtomicU64,
}

pub(crate) struct Shared {
    pub config: EngineConfig,
    pub collaborators: Collaborators,
    pub registry: Arc<ActivityRegistry>,
    pub hooks: HookDispatcher,
    pub stats: StatsCounters,
    pub shutting_down: AtomicBool,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// `Ok` means the toggle was accepted and is animating out of band.
pub type ToggleOutcome = Result<AnimationHandle, ToggleError>;

/// Handle to an accepted animation.
#[derive(Debug)]
pub struct AnimationHandle {
    structure_id: StructureId,
    task: JoinHandle<Result<AnimationReport, ToggleError>>,
}

impl AnimationHandle {
    pub fn structure_id(&self) -> StructureId {
        self.structure_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the animation to finish and return its report.
    pub async fn wait(self) -> Result<AnimationReport, ToggleError> {
        self.task
            .await
            .map_err(|e| ToggleError::Fatal(format!("animation task for {} failed: {}", self.structure_id, e)))?
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Cheap to clone; all clones drive the same registry.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let registry = Arc::new(ActivityRegistry::new(config.registry_shards));
        Self {
            shared: Arc::new(Shared {
                config,
                collaborators,
                registry,
                hooks: HookDispatcher::new(),
                stats: StatsCounters::default(),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn hooks(&self) -> &HookDispatcher {
        &self.shared.hooks
    }

    pub fn register_hook(&self, hook: Arc<dyn AnimationHook>) {
        self.shared.hooks.register(hook);
    }

    pub fn registry(&self) -> &Arc<ActivityRegistry> {
        &self.shared.registry
    }

    // -----------------------------------------------------------------------
    // Toggling
    // -----------------------------------------------------------------------

    /// Start building a toggle request for `id`.
    pub fn request(&self, id: StructureId) -> ToggleRequestBuilder<'_> {
        ToggleRequestBuilder::new(&self.shared.config, &self.shared.collaborators, id)
    }

    /// Claim the structure, prepare the animation and start it.
    ///
    /// Returns once preparation has resolved; the animation itself runs as
    /// its own task. Fails with `Busy` once `shutdown` has begun.
    pub async fn submit_toggle(&self, request: ToggleRequest) -> ToggleOutcome {
        let id = request.structure_id();

        let Some(claim) = self.shared.registry.try_claim(id) else {
            debug!("Toggle of {} rejected: already animating", id);
            return Err(ToggleError::Busy);
        };
        // Checked while holding the claim, so shutdown's force stop either
        // sees this claim or this check sees the flag.
        if self.shared.shutting_down.load(Ordering::SeqCst) {
            debug!("Toggle of {} rejected: engine is shutting down", id);
            return Err(ToggleError::Busy);
        }
        self.shared.stats.started.fetch_add(1, Ordering::Relaxed);

        let animator = Animator::prepare(self.shared.clone(), request, claim).await?;

        let engine = self.clone();
        let span = tracing::info_span!("animation", structure = %id);
        let task = tokio::spawn(
            async move {
                let result = animator.run().await;
                if let Ok(report) = &result {
                    engine.after_animation(report);
                }
                result
            }
            .instrument(span),
        );

        Ok(AnimationHandle {
            structure_id: id,
            task,
        })
    }

    /// Build and submit in one call.
    pub async fn toggle(&self, id: StructureId, actor: Option<ActorId>, action: ToggleAction) -> ToggleOutcome {
        let request = self
            .request(id)
            .cause(if actor.is_some() {
                ToggleCause::Actor
            } else {
                ToggleCause::Server
            })
            .actor(actor)
            .action(action)
            .build()
            .await?;
        self.submit_toggle(request).await
    }

    pub fn is_animating(&self, id: StructureId) -> bool {
        self.shared.registry.is_claimed(id)
    }

    /// Make every running animation jump to its end state.
    pub fn force_stop_all(&self) -> Vec<StructureId> {
        let stopped = self.shared.registry.force_stop_all();
        if !stopped.is_empty() {
            info!("Force-stopping {} animation(s)", stopped.len());
        }
        stopped
    }

    /// Force-stop everything and wait until every claim has been released.
    /// Pending auto-close timers are dropped.
    pub async fn shutdown(&self) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        self.force_stop_all();
        self.shared.registry.wait_idle().await;
        info!("Engine shut down");
    }

    pub fn stats(&self) -> EngineStats {
        let s = &self.shared.stats;
        EngineStats {
            active_animations: self.shared.registry.active_count(),
            total_started: s.started.load(Ordering::Relaxed),
            total_completed: s.completed.load(Ordering::Relaxed),
            total_aborted: s.aborted.load(Ordering::Relaxed),
            total_steps: s.steps.load(Ordering::Relaxed),
        }
    }

    // -----------------------------------------------------------------------
    // Admin edits
    // -----------------------------------------------------------------------

    /// Lock or unlock a structure.
    ///
    /// Holds the structure's claim while editing, so it fails with `Busy`
    /// during an animation. `actor = None` is a server-side edit.
    pub async fn set_locked(&self, actor: Option<&ActorId>, id: StructureId, locked: bool) -> Result<Structure, ToggleError> {
        let claim = self.shared.registry.try_claim(id).ok_or(ToggleError::Busy)?;
        let collab = &self.shared.collaborators;

        let mut structure = collab
            .store
            .load_structure(id)
            .map_err(|e| ToggleError::Fatal(e.to_string()))?
            .ok_or(ToggleError::NotFound(id))?;

        if let Some(actor) = actor {
            if !may_act(&self.shared.config, collab, actor, &structure, StructureAttribute::Lock).await {
                return Err(ToggleError::NoPermission);
            }
        }

        structure.locked = locked;
        collab
            .store
            .commit_structure(&structure)
            .map_err(|e| ToggleError::Fatal(e.to_string()))?;
        claim.release();

        debug!("{} {}", id, if locked { "locked" } else { "unlocked" });
        Ok(structure)
    }

    // -----------------------------------------------------------------------
    // Follow-ups
    // -----------------------------------------------------------------------

    fn after_animation(&self, report: &AnimationReport) {
        let Some(secs) = report.structure.auto_close_secs else {
            return;
        };
        if !report.committed || !report.structure.is_open || self.shared.shutting_down.load(Ordering::SeqCst) {
            return;
        }

        let id = report.structure_id;
        let Ok(delay) = Duration::try_from_secs_f64(secs.max(0.0)) else {
            debug!("Auto-close of {} skipped: delay of {}s is out of range", id, secs);
            return;
        };

        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if engine.shared.shutting_down.load(Ordering::SeqCst) {
                return;
            }
            let request = engine
                .request(id)
                .cause(ToggleCause::Automated)
                .action(ToggleAction::Close)
                .build()
                .await;
            let outcome = match request {
                Ok(request) => engine.submit_toggle(request).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => debug!("Auto-closing {}", id),
                Err(e) => debug!("Auto-close of {} skipped: {}", id, e),
            }
        });
    }
}
