//! Activity registry: which structures are animating right now.
//!
//! Claims are spread over a fixed set of shards, each behind its own
//! `parking_lot::Mutex`, so claiming one structure never waits on an
//! unrelated one. The registry is the single source of truth for
//! "is this structure animating".

use parking_lot::Mutex;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Notify};

use crate::structure::StructureId;

// ---------------------------------------------------------------------------
// Stop signal
// ---------------------------------------------------------------------------

/// Tells a running animation to jump straight to its end state.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        if self.is_stopped() {
            return;
        }
        self.notify.notified().await;
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ClaimSlot {
    token: u64,
    stop: Arc<StopSignal>,
    since: Instant,
}

pub struct ActivityRegistry {
    shards: Box<[Mutex<HashMap<StructureId, ClaimSlot>>]>,
    next_token: AtomicU64,
    active: watch::Sender<usize>,
}

impl ActivityRegistry {
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let (active, _) = watch::channel(0);
        Self {
            shards,
            next_token: AtomicU64::new(1),
            active,
        }
    }

    fn shard(&self, id: StructureId) -> &Mutex<HashMap<StructureId, ClaimSlot>> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        &self.shards[(hasher.finish() % self.shards.len() as u64) as usize]
    }

    /// Claim `id` for a new animation. `None` if it is already claimed.
    pub fn try_claim(self: &Arc<Self>, id: StructureId) -> Option<ClaimGuard> {
        let mut shard = self.shard(id).lock();
        let Entry::Vacant(slot) = shard.entry(id) else {
            return None;
        };

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let stop = Arc::new(StopSignal::default());
        slot.insert(ClaimSlot {
            token,
            stop: stop.clone(),
            since: Instant::now(),
        });
        self.active.send_modify(|n| *n += 1);

        Some(ClaimGuard {
            registry: self.clone(),
            id,
            token,
            stop,
            released: false,
        })
    }

    /// Drop whatever claim `id` has. Safe to call repeatedly.
    pub fn release(&self, id: StructureId) -> bool {
        let removed = self.shard(id).lock().remove(&id).is_some();
        if removed {
            self.active.send_modify(|n| *n = n.saturating_sub(1));
        }
        removed
    }

    /// Release only if the current claim is still the one holding `token`.
    fn release_token(&self, id: StructureId, token: u64) -> bool {
        let removed = {
            let mut shard = self.shard(id).lock();
            match shard.get(&id) {
                Some(slot) if slot.token == token => shard.remove(&id).is_some(),
                _ => false,
            }
        };
        if removed {
            self.active.send_modify(|n| *n = n.saturating_sub(1));
        }
        removed
    }

    pub fn is_claimed(&self, id: StructureId) -> bool {
        self.shard(id).lock().contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        *self.active.borrow()
    }

    /// Ids currently claimed, oldest claim first.
    pub fn active_ids(&self) -> Vec<StructureId> {
        let mut claims: Vec<(Instant, StructureId)> = self
            .shards
            .iter()
            .flat_map(|s| s.lock().iter().map(|(id, slot)| (slot.since, *id)).collect::<Vec<_>>())
            .collect();
        claims.sort();
        claims.into_iter().map(|(_, id)| id).collect()
    }

    /// Signal every active animation to finish immediately.
    ///
    /// Claims are not removed here; each animation releases its own claim
    /// once its final layout is written.
    pub fn force_stop_all(&self) -> Vec<StructureId> {
        let mut stopped = Vec::new();
        for shard in self.shards.iter() {
            for (id, slot) in shard.lock().iter() {
                slot.stop.stop();
                stopped.push(*id);
            }
        }
        stopped.sort();
        stopped
    }

    /// Resolves once no structure is claimed.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

// ---------------------------------------------------------------------------
// Claim guard
// ---------------------------------------------------------------------------

/// Proof of an active claim. Dropping it releases the claim it holds and
/// never a newer claim on the same structure.
#[derive(Debug)]
pub struct ClaimGuard {
    registry: Arc<ActivityRegistry>,
    id: StructureId,
    token: u64,
    stop: Arc<StopSignal>,
    released: bool,
}

impl ClaimGuard {
    pub fn id(&self) -> StructureId {
        self.id
    }

    pub fn stop_signal(&self) -> &Arc<StopSignal> {
        &self.stop
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release_token(self.id, self.token);
        }
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("shards", &self.shards.len())
            .field("active", &self.active_count())
            .finish()
    }
}
