//! In-memory collaborators: a chunked block world, a structure store and a
//! static permission table. Used by the demo server and the test-suite.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::error::{StoreError, SurfaceError};
use crate::geometry::Cuboid;
use crate::structure::{
    layout_fingerprint, ActorId, BlockDescriptor, Structure, StructureAttribute, StructureId,
};
use crate::types::BlockPos;
use crate::world::{BlockSurface, PermissionAnswer, PermissionOracle, RegionGate, RegionReadiness, StructureStore};

// ---------------------------------------------------------------------------
// Block world (chunked load tracking)
// ---------------------------------------------------------------------------

/// Sparse block map split into square columns ("chunks") that must be
/// loaded before they can be read or written.
pub struct InMemoryWorld {
    pub chunk_size: i32,
    blocks: RwLock<HashMap<BlockPos, BlockDescriptor>>,
    loaded: RwLock<HashSet<(i32, i32)>>,
    writes: AtomicU64,
}

impl InMemoryWorld {
    pub fn new(chunk_size: i32) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            blocks: RwLock::new(HashMap::new()),
            loaded: RwLock::new(HashSet::new()),
            writes: AtomicU64::new(0),
        }
    }

    fn chunk_coord(&self, x: i32, z: i32) -> (i32, i32) {
        (x.div_euclid(self.chunk_size), z.div_euclid(self.chunk_size))
    }

    fn chunks_of(&self, region: &Cuboid) -> Vec<(i32, i32)> {
        let (cx0, cz0) = self.chunk_coord(region.min.x, region.min.z);
        let (cx1, cz1) = self.chunk_coord(region.max.x, region.max.z);
        (cx0..=cx1)
            .flat_map(|cx| (cz0..=cz1).map(move |cz| (cx, cz)))
            .collect()
    }

    pub fn load_region(&self, region: &Cuboid) {
        let chunks = self.chunks_of(region);
        self.loaded.write().extend(chunks);
    }

    pub fn unload_region(&self, region: &Cuboid) {
        let chunks = self.chunks_of(region);
        let mut loaded = self.loaded.write();
        for c in chunks {
            loaded.remove(&c);
        }
    }

    pub fn is_loaded(&self, pos: BlockPos) -> bool {
        self.loaded.read().contains(&self.chunk_coord(pos.x, pos.z))
    }

    /// Place `block` everywhere in `region`, loading it first.
    pub fn fill(&self, region: &Cuboid, block: BlockDescriptor) {
        self.load_region(region);
        let mut blocks = self.blocks.write();
        for pos in region.positions() {
            if block.is_air() {
                blocks.remove(&pos);
            } else {
                blocks.insert(pos, block.clone());
            }
        }
    }

    /// Block at `pos` regardless of load state; air when empty.
    pub fn block_at(&self, pos: BlockPos) -> BlockDescriptor {
        self.blocks
            .read()
            .get(&pos)
            .cloned()
            .unwrap_or_else(BlockDescriptor::air)
    }

    /// Non-air blocks inside `region`, ordered by position.
    pub fn layout(&self, region: &Cuboid) -> BTreeMap<BlockPos, BlockDescriptor> {
        self.blocks
            .read()
            .iter()
            .filter(|(pos, _)| region.contains(**pos))
            .map(|(pos, b)| (*pos, b.clone()))
            .collect()
    }

    pub fn fingerprint(&self, region: &Cuboid) -> String {
        let layout = self.layout(region);
        layout_fingerprint(layout.iter().map(|(p, b)| (*p, b)))
    }

    pub fn block_count(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl BlockSurface for InMemoryWorld {
    fn get_block(&self, pos: BlockPos) -> Option<BlockDescriptor> {
        self.is_loaded(pos).then(|| self.block_at(pos))
    }

    fn set_block(&self, pos: BlockPos, block: BlockDescriptor) -> Result<(), SurfaceError> {
        if !self.is_loaded(pos) {
            return Err(SurfaceError::Unloaded(pos));
        }
        let mut blocks = self.blocks.write();
        if block.is_air() {
            blocks.remove(&pos);
        } else {
            blocks.insert(pos, block);
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl RegionGate for InMemoryWorld {
    fn ensure_ready(&self, region: &Cuboid) -> RegionReadiness {
        let loaded = self.loaded.read();
        if self.chunks_of(region).iter().all(|c| loaded.contains(c)) {
            RegionReadiness::Ready
        } else {
            RegionReadiness::Unready
        }
    }
}

// ---------------------------------------------------------------------------
// Structure store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryStore {
    structures: RwLock<HashMap<StructureId, Structure>>,
    commits: AtomicUsize,
    fail_commits: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, structure: Structure) {
        self.structures.write().insert(structure.id, structure);
    }

    pub fn get(&self, id: StructureId) -> Option<Structure> {
        self.structures.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.structures.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.read().is_empty()
    }

    /// Successful commits since creation.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Make every following commit fail (for exercising fatal paths).
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

impl StructureStore for InMemoryStore {
    fn load_structure(&self, id: StructureId) -> Result<Option<Structure>, StoreError> {
        Ok(self.get(id))
    }

    fn commit_structure(&self, structure: &Structure) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::CommitRejected {
                id: structure.id,
                reason: "store is read-only".into(),
            });
        }
        self.structures.write().insert(structure.id, structure.clone());
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Fixed permission table: bypass grants per actor and attribute, plus
/// protected regions nobody may move blocks into.
#[derive(Default)]
pub struct StaticPermissions {
    grants: RwLock<HashSet<(ActorId, StructureAttribute)>>,
    protected: RwLock<Vec<Cuboid>>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, actor: ActorId, attribute: StructureAttribute) {
        self.grants.write().insert((actor, attribute));
    }

    pub fn protect(&self, region: Cuboid) {
        self.protected.write().push(region);
    }
}

impl PermissionOracle for StaticPermissions {
    fn has_permission(&self, actor: &ActorId, _structure: StructureId, attribute: StructureAttribute) -> PermissionAnswer {
        if self.grants.read().contains(&(actor.clone(), attribute)) {
            PermissionAnswer::Granted
        } else {
            PermissionAnswer::Denied
        }
    }

    fn can_occupy(&self, _actor: &ActorId, region: &Cuboid) -> PermissionAnswer {
        if self.protected.read().iter().any(|p| p.intersects(region)) {
            PermissionAnswer::Denied
        } else {
            PermissionAnswer::Granted
        }
    }
}
