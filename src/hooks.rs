//! Ordered observer hooks around each animation.
//!
//! Hooks run synchronously in registration order. Only the prepare stage can
//! stop an animation; errors and panics from any hook are logged and
//! otherwise ignored.

use log::warn;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::protocol::{AnimationEnded, AnimationPrepared, AnimationProgress, AnimationStarted, StructureEvent};
use crate::structure::StructureSnapshot;

/// Observer of animation lifecycle events (sound, highlighting, logging …).
pub trait AnimationHook: Send + Sync {
    fn name(&self) -> &str;

    /// Return `Ok(false)` to veto the animation. An error counts as allow.
    fn on_prepare(
        &self,
        _snapshot: &StructureSnapshot,
        _event: &StructureEvent<AnimationPrepared>,
    ) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn on_start(&self, _snapshot: &StructureSnapshot, _event: &StructureEvent<AnimationStarted>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_step(&self, _snapshot: &StructureSnapshot, _event: &StructureEvent<AnimationProgress>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_end(&self, _snapshot: &StructureSnapshot, _event: &StructureEvent<AnimationEnded>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A prepare hook declined the animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Veto {
    pub hook: String,
}

#[derive(Default)]
pub struct HookDispatcher {
    hooks: RwLock<Vec<Arc<dyn AnimationHook>>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, hook: Arc<dyn AnimationHook>) {
        self.hooks.write().push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Ask every hook in order; the first `false` wins and later hooks are
    /// not consulted.
    pub fn notify_prepare(
        &self,
        snapshot: &StructureSnapshot,
        event: &StructureEvent<AnimationPrepared>,
    ) -> Result<(), Veto> {
        for hook in self.current() {
            match guarded(hook.as_ref(), "prepare", || hook.on_prepare(snapshot, event)) {
                Some(false) => {
                    return Err(Veto {
                        hook: hook.name().to_string(),
                    })
                }
                Some(true) | None => {}
            }
        }
        Ok(())
    }

    pub fn notify_start(&self, snapshot: &StructureSnapshot, event: &StructureEvent<AnimationStarted>) {
        for hook in self.current() {
            guarded(hook.as_ref(), "start", || hook.on_start(snapshot, event));
        }
    }

    pub fn notify_step(&self, snapshot: &StructureSnapshot, event: &StructureEvent<AnimationProgress>) {
        for hook in self.current() {
            guarded(hook.as_ref(), "step", || hook.on_step(snapshot, event));
        }
    }

    pub fn notify_end(&self, snapshot: &StructureSnapshot, event: &StructureEvent<AnimationEnded>) {
        for hook in self.current() {
            guarded(hook.as_ref(), "end", || hook.on_end(snapshot, event));
        }
    }

    /// Copy of the hook list, so hooks may register others while running.
    fn current(&self) -> Vec<Arc<dyn AnimationHook>> {
        self.hooks.read().clone()
    }
}

/// Run one hook call, turning errors and panics into a logged `None`.
fn guarded<T>(hook: &dyn AnimationHook, stage: &str, call: impl FnOnce() -> anyhow::Result<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("Hook '{}' failed during {}: {:#}", hook.name(), stage, e);
            None
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            warn!("Hook '{}' panicked during {}: {}", hook.name(), stage, message);
            None
        }
    }
}
