//! Block mover: runs one animation from preparation to its final commit.
//!
//! ```text
//! Preparing ──► Running ──► Finalizing ──► Done
//!     │            │             │
//!     └────────────┴──► Aborting ┘(commit failure restores too)
//! ```
//!
//! `Animator::prepare` performs every check that can still reject the
//! toggle and hands back an animator that is guaranteed to finish with a
//! single commit or a full restore. [`Animator::run`] drives the steps on a
//! fixed tokio interval, so many animations share the runtime cooperatively.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

use crate::engine::Shared;
use crate::error::{FormulaError, LayoutError, ToggleError};
use crate::geometry::{cuboid_after_action, snap, Cuboid};
use crate::kinds;
use crate::protocol::{
    AnimationEnded, AnimationPrepared, AnimationProgress, AnimationStarted, EndReason, StructureEvent,
};
use crate::registry::ClaimGuard;
use crate::request::ToggleRequest;
use crate::structure::{BlockDescriptor, SnapshotBlock, Structure, StructureId, StructureSnapshot};
use crate::trajectory::Trajectory;
use crate::types::{BlockPos, EngineConfig};
use crate::world::{BlockSurface, RegionReadiness};

// ---------------------------------------------------------------------------
// State & report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationState {
    Preparing,
    Running,
    Finalizing,
    Aborting,
    Done,
}

impl AnimationState {
    fn can_enter(self, next: AnimationState) -> bool {
        use AnimationState::*;
        matches!(
            (self, next),
            (Preparing, Running)
                | (Preparing, Finalizing)
                | (Preparing, Aborting)
                | (Running, Finalizing)
                | (Running, Aborting)
                | (Finalizing, Aborting)
                | (Finalizing, Done)
                | (Aborting, Done)
        )
    }
}

/// A block whose movement formula could not be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaFault {
    pub block: BlockPos,
    pub error: FormulaError,
}

/// Result of a finished animation.
#[derive(Debug, Clone)]
pub struct AnimationReport {
    pub structure_id: StructureId,
    pub reason: EndReason,
    pub committed: bool,
    pub steps_run: u32,
    pub total_steps: u32,
    /// Structure as committed to the store.
    pub structure: Structure,
    /// Every state the animation passed through, in order.
    pub path: Vec<AnimationState>,
    pub formula_faults: Vec<FormulaFault>,
}

// ---------------------------------------------------------------------------
// Layout writes
// ---------------------------------------------------------------------------

/// Move `blocks` to `targets` (same order), clearing positions in `occupied`
/// that are no longer wanted.
///
/// `occupied` holds the positions currently filled by this structure and is
/// updated in place. Without `force`, a target already holding a foreign
/// block is left alone for this write. Applying the same targets twice
/// leaves the same layout as applying them once.
///
/// Every position is attempted even after a failed write; the failures are
/// returned together and `occupied` keeps the positions that could not be
/// cleared.
pub fn apply_layout(
    surface: &dyn BlockSurface,
    blocks: &[SnapshotBlock],
    targets: &[BlockPos],
    occupied: &mut HashSet<BlockPos>,
    force: bool,
) -> Result<(), LayoutError> {
    let wanted: HashSet<BlockPos> = targets.iter().copied().collect();
    let mut failures = Vec::new();

    let stale: Vec<BlockPos> = occupied.difference(&wanted).copied().collect();
    for pos in stale {
        match surface.set_block(pos, BlockDescriptor::air()) {
            Ok(()) => {
                occupied.remove(&pos);
            }
            Err(e) => failures.push(e),
        }
    }

    let mut replaced = Vec::new();
    for (block, pos) in blocks.iter().zip(targets) {
        let foreign = !occupied.contains(pos) && surface.get_block(*pos).is_some_and(|b| !b.is_air());
        if foreign && !force {
            continue;
        }
        match surface.set_block(*pos, block.block.clone()) {
            Ok(()) => {
                if foreign {
                    replaced.push(*pos);
                }
                occupied.insert(*pos);
            }
            Err(e) => failures.push(e),
        }
    }

    if let Some(first) = replaced.first() {
        warn!(
            "Forced layout write replaced {} foreign block(s), first at {}",
            replaced.len(),
            first
        );
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(LayoutError { failures })
    }
}

/// Read every non-air block inside the structure's bounds.
///
/// Stops early once `limit` is exceeded; the count returned is then
/// `limit + 1`.
fn capture_blocks(
    surface: &dyn BlockSurface,
    cuboid: &Cuboid,
    limit: usize,
) -> Result<Vec<SnapshotBlock>, ToggleError> {
    let mut blocks = Vec::new();
    for pos in cuboid.positions() {
        let block = surface.get_block(pos).ok_or(ToggleError::RegionNotReady)?;
        if block.is_air() {
            continue;
        }
        blocks.push(SnapshotBlock { origin: pos, block });
        if blocks.len() > limit {
            return Err(ToggleError::BlockLimitExceeded {
                count: blocks.len(),
                limit,
            });
        }
    }
    Ok(blocks)
}

/// The request's duration override, capped at `max_duration_secs`.
pub fn duration_override(config: &EngineConfig, request: &ToggleRequest) -> Option<Duration> {
    request.duration().map(|d| d.min(config.max_duration()))
}

/// Running steps for this request: override, else configured, else kind default.
pub fn planned_steps(config: &EngineConfig, structure: &Structure, request: &ToggleRequest) -> u32 {
    let secs = duration_override(config, request)
        .map(|d| d.as_secs_f64())
        .or(structure.config.duration_secs)
        .unwrap_or(kinds::spec(structure.kind).default_duration_secs)
        .max(0.0)
        .min(config.max_duration().as_secs_f64());
    let steps = (secs * config.tick_rate()).ceil() as u32;
    steps.max(config.min_steps).max(1)
}

// ---------------------------------------------------------------------------
// Animator
// ---------------------------------------------------------------------------

pub struct Animator {
    shared: Arc<Shared>,
    request: ToggleRequest,
    claim: Option<ClaimGuard>,
    state: AnimationState,
    path: Vec<AnimationState>,
    snapshot: StructureSnapshot,
    trajectory: Trajectory,
    destination: Cuboid,
    region: Cuboid,
    origins: Vec<BlockPos>,
    occupied: HashSet<BlockPos>,
    faults: BTreeMap<BlockPos, FormulaError>,
    steps_run: u32,
}

impl Animator {
    /// Run the preparing stage.
    ///
    /// On failure nothing has moved; the claim is released and the error is
    /// returned to the submitter.
    pub(crate) async fn prepare(
        shared: Arc<Shared>,
        request: ToggleRequest,
        claim: ClaimGuard,
    ) -> Result<Animator, ToggleError> {
        let id = request.structure_id();
        match Self::try_prepare(shared.clone(), request, claim).await {
            Ok(animator) => Ok(animator),
            Err(e) => {
                // try_prepare dropped the guard, which released the claim.
                shared.stats.aborted.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Animation of {} failed to prepare ({:?} -> {:?} -> {:?}): {}",
                    id,
                    AnimationState::Preparing,
                    AnimationState::Aborting,
                    AnimationState::Done,
                    e
                );
                Err(e)
            }
        }
    }

    async fn try_prepare(
        shared: Arc<Shared>,
        request: ToggleRequest,
        claim: ClaimGuard,
    ) -> Result<Animator, ToggleError> {
        let collab = &shared.collaborators;
        let id = request.structure_id();

        let structure = collab
            .store
            .load_structure(id)
            .map_err(|e| {
                error!("Failed to load structure {} while preparing: {}", id, e);
                ToggleError::Fatal(e.to_string())
            })?
            .ok_or(ToggleError::NotFound(id))?;

        // The record may have changed between validation and the claim.
        if structure.is_open != request.was_open() || !request.action().applies_to(structure.is_open) {
            return Err(if structure.is_open {
                ToggleError::AlreadyOpen
            } else {
                ToggleError::AlreadyClosed
            });
        }

        let direction = kinds::movement_direction(&structure).ok_or(ToggleError::NoDirection)?;
        let destination = cuboid_after_action(&structure, request.action()).ok_or(ToggleError::NoDirection)?;

        if let Some(actor) = request.actor() {
            let allowed = collab
                .permissions
                .can_occupy(actor, &destination)
                .resolve(Duration::from_millis(shared.config.permission_timeout_ms))
                .await;
            if !allowed {
                return Err(ToggleError::NoPermission);
            }
        }

        let region = structure.cuboid.union(&destination);
        if collab.gate.ensure_ready(&region) == RegionReadiness::Unready {
            return Err(ToggleError::RegionNotReady);
        }

        let limit = structure
            .block_limit
            .map_or(shared.config.max_block_count, |l| l.min(shared.config.max_block_count));
        let blocks = capture_blocks(collab.surface.as_ref(), &structure.cuboid, limit)?;

        let total_steps = planned_steps(&shared.config, &structure, &request);
        let snapshot = StructureSnapshot::new(structure, blocks);
        let trajectory = Trajectory::new(&snapshot, direction, total_steps).ok_or(ToggleError::NoDirection)?;

        let origins: Vec<BlockPos> = snapshot.blocks().iter().map(|b| b.origin).collect();
        let occupied: HashSet<BlockPos> = origins.iter().copied().collect();
        for block in snapshot.blocks() {
            let target = trajectory.final_position(block);
            if occupied.contains(&target) {
                continue;
            }
            if collab.surface.get_block(target).is_some_and(|b| !b.is_air()) {
                return Err(ToggleError::Obstructed(target));
            }
        }

        let event = StructureEvent::new(
            id,
            0,
            AnimationPrepared {
                kind: snapshot.kind(),
                cause: request.cause(),
                action: request.action(),
                direction,
                block_count: snapshot.block_count(),
                from: snapshot.cuboid(),
                to: destination,
                total_steps: if request.skip_animation() { 0 } else { total_steps },
            },
        );
        if let Err(veto) = shared.hooks.notify_prepare(&snapshot, &event) {
            return Err(ToggleError::VetoedByHook(veto.hook));
        }

        debug!(
            "Prepared {} ({:?}, {} blocks, {} steps, {:?})",
            id,
            snapshot.kind(),
            snapshot.block_count(),
            total_steps,
            direction
        );

        Ok(Animator {
            shared,
            request,
            claim: Some(claim),
            state: AnimationState::Preparing,
            path: vec![AnimationState::Preparing],
            snapshot,
            trajectory,
            destination,
            region,
            origins,
            occupied,
            faults: BTreeMap::new(),
            steps_run: 0,
        })
    }

    fn transition(&mut self, next: AnimationState) {
        debug_assert!(
            self.state.can_enter(next),
            "illegal animation transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("{}: {:?} -> {:?}", self.snapshot.id(), self.state, next);
        self.state = next;
        self.path.push(next);
    }

    /// Drive the animation to its end and commit the result.
    pub async fn run(mut self) -> Result<AnimationReport, ToggleError> {
        let stopped = self.claim.as_ref().is_some_and(|c| c.stop_signal().is_stopped());

        let reason = if self.request.skip_animation() {
            EndReason::Skipped
        } else if stopped {
            EndReason::ForceStopped
        } else {
            match self.run_steps().await {
                Ok(reason) => reason,
                Err(e) => return Err(self.abort(e)),
            }
        };

        self.finalize(reason)
    }

    async fn run_steps(&mut self) -> Result<EndReason, ToggleError> {
        self.transition(AnimationState::Running);

        let config = &self.shared.config;
        let total = self.trajectory.total_steps();
        let hook_every = config.hook_update_interval;
        let region_every = config.region_check_interval;

        let stop = match &self.claim {
            Some(claim) => claim.stop_signal().clone(),
            None => return Ok(EndReason::ForceStopped),
        };

        let mut timer = tokio::time::interval(config.tick_interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await;
        let deadline = duration_override(config, &self.request)
            .and_then(|d| Instant::now().checked_add(d));

        self.shared.hooks.notify_start(
            &self.snapshot,
            &StructureEvent::new(
                self.snapshot.id(),
                0,
                AnimationStarted {
                    total_steps: total,
                    step_ms: config.tick_interval().as_millis() as u64,
                },
            ),
        );

        for step in 1..=total {
            tokio::select! {
                biased;
                _ = stop.stopped() => return Ok(EndReason::ForceStopped),
                _ = timer.tick() => {}
            }

            if step < total && deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(EndReason::DeadlineReached);
            }

            if region_every > 0
                && step % region_every == 0
                && self.shared.collaborators.gate.ensure_ready(&self.region) == RegionReadiness::Unready
            {
                return Err(ToggleError::RegionNotReady);
            }

            self.apply_step(step)?;
            self.steps_run = step;
            self.shared.stats.steps.fetch_add(1, Ordering::Relaxed);

            if hook_every > 0 && step % hook_every == 0 {
                self.shared.hooks.notify_step(
                    &self.snapshot,
                    &StructureEvent::new(
                        self.snapshot.id(),
                        step,
                        AnimationProgress {
                            step,
                            total_steps: total,
                        },
                    ),
                );
            }
        }

        Ok(EndReason::Completed)
    }

    fn apply_step(&mut self, step: u32) -> Result<(), ToggleError> {
        let mut targets = Vec::with_capacity(self.snapshot.block_count());
        for block in self.snapshot.blocks() {
            let (rotated, fault) = self.trajectory.position_at(block, step);
            if let Some(e) = fault {
                self.faults.entry(block.origin).or_insert(e);
            }
            targets.push(snap(rotated.position));
        }

        apply_layout(
            self.shared.collaborators.surface.as_ref(),
            self.snapshot.blocks(),
            &targets,
            &mut self.occupied,
            false,
        )
        .map_err(|e| {
            if e.all_unloaded() {
                ToggleError::RegionNotReady
            } else {
                ToggleError::Fatal(e.to_string())
            }
        })
    }

    fn finalize(mut self, reason: EndReason) -> Result<AnimationReport, ToggleError> {
        self.transition(AnimationState::Finalizing);
        let id = self.snapshot.id();

        let targets: Vec<BlockPos> = self
            .snapshot
            .blocks()
            .iter()
            .map(|b| self.trajectory.final_position(b))
            .collect();

        if let Err(e) = apply_layout(
            self.shared.collaborators.surface.as_ref(),
            self.snapshot.blocks(),
            &targets,
            &mut self.occupied,
            true,
        ) {
            return Err(self.fail(format!("writing final layout: {}", e)));
        }

        let structure = self.committed_structure();
        if let Err(e) = self.shared.collaborators.store.commit_structure(&structure) {
            return Err(self.fail(format!("committing structure: {}", e)));
        }

        if let Some(claim) = self.claim.take() {
            claim.release();
        }
        self.transition(AnimationState::Done);
        self.shared.stats.completed.fetch_add(1, Ordering::Relaxed);
        self.report_faults();

        info!(
            "{} {} after {}/{} steps ({:?})",
            id,
            if structure.is_open { "opened" } else { "closed" },
            self.steps_run,
            self.trajectory.total_steps(),
            reason
        );

        self.notify_end(reason, true, structure.cuboid);

        Ok(AnimationReport {
            structure_id: id,
            reason,
            committed: true,
            steps_run: self.steps_run,
            total_steps: self.trajectory.total_steps(),
            structure,
            path: self.path.clone(),
            formula_faults: self.fault_list(),
        })
    }

    fn committed_structure(&self) -> Structure {
        let mut structure = self.snapshot.structure().clone();
        let spec = kinds::spec(structure.kind);
        structure.is_open = !structure.is_open;
        structure.cuboid = self.destination;
        structure.engine = self
            .trajectory
            .motion()
            .apply_to_engine(structure.engine, spec.engine_follows);
        structure
    }

    /// Running could not continue: put every block back and release.
    fn abort(mut self, cause: ToggleError) -> ToggleError {
        self.transition(AnimationState::Aborting);
        self.restore();
        if let Some(claim) = self.claim.take() {
            claim.release();
        }
        self.transition(AnimationState::Done);
        self.shared.stats.aborted.fetch_add(1, Ordering::Relaxed);
        warn!(
            "Animation of {} aborted after {} steps: {}",
            self.snapshot.id(),
            self.steps_run,
            cause
        );
        self.notify_end(EndReason::Aborted, false, self.snapshot.cuboid());
        cause
    }

    /// Finalizing failed: restore, release and report loudly.
    fn fail(mut self, what: String) -> ToggleError {
        let id = self.snapshot.id();
        error!(
            "Fatal error finalizing {} ({:?}, {} blocks, {}/{} steps, cause {:?}): {}",
            id,
            self.snapshot.kind(),
            self.snapshot.block_count(),
            self.steps_run,
            self.trajectory.total_steps(),
            self.request.cause(),
            what
        );
        self.transition(AnimationState::Aborting);
        self.restore();
        if let Some(claim) = self.claim.take() {
            claim.release();
        }
        self.transition(AnimationState::Done);
        self.shared.stats.aborted.fetch_add(1, Ordering::Relaxed);
        self.notify_end(EndReason::Failed, false, self.snapshot.cuboid());
        ToggleError::Fatal(format!("structure {}: {}", id, what))
    }

    fn restore(&mut self) {
        if let Err(e) = apply_layout(
            self.shared.collaborators.surface.as_ref(),
            self.snapshot.blocks(),
            &self.origins,
            &mut self.occupied,
            true,
        ) {
            let mut stranded = e.positions();
            stranded.sort();
            warn!(
                "Could not fully restore {} (layout {}): {}; unwritten positions {:?}",
                self.snapshot.id(),
                self.snapshot.fingerprint(),
                e,
                stranded
            );
        }
    }

    fn notify_end(&self, reason: EndReason, committed: bool, final_cuboid: Cuboid) {
        self.shared.hooks.notify_end(
            &self.snapshot,
            &StructureEvent::new(
                self.snapshot.id(),
                self.steps_run,
                AnimationEnded {
                    reason,
                    committed,
                    steps_run: self.steps_run,
                    final_cuboid,
                    formula_faults: self.faults.len(),
                },
            ),
        );
    }

    fn report_faults(&self) {
        if let Some((pos, first)) = self.faults.iter().next() {
            warn!(
                "{}: movement formula failed for {} of {} blocks (first at {}: {}); those blocks did not move",
                self.snapshot.id(),
                self.faults.len(),
                self.snapshot.block_count(),
                pos,
                first
            );
        }
    }

    fn fault_list(&self) -> Vec<FormulaFault> {
        self.faults
            .iter()
            .map(|(block, error)| FormulaFault {
                block: *block,
                error: error.clone(),
            })
            .collect()
    }
}
