//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use animated_structures::{
    engine::{Collaborators, Engine},
    error::SurfaceError,
    geometry::Cuboid,
    memory::{InMemoryStore, InMemoryWorld, StaticPermissions},
    structure::{ActorId, BlockDescriptor, OpenDirection, PermissionTier, Structure, StructureKind},
    types::{BlockPos, EngineConfig},
    world::{BlockSurface, RegionGate, RegionReadiness},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const DOOR_ID: u64 = 1;
pub const PORTCULLIS_ID: u64 = 2;
pub const FLAG_ID: u64 = 3;

pub struct Fixture {
    pub engine: Engine,
    pub world: Arc<InMemoryWorld>,
    pub store: Arc<InMemoryStore>,
    pub permissions: Arc<StaticPermissions>,
    pub gate: Arc<SwitchableGate>,
    pub surface: Arc<FlakySurface>,
}

/// Region gate that defers to the world unless forced unready.
pub struct SwitchableGate {
    pub world: Arc<InMemoryWorld>,
    pub unready: AtomicBool,
}

impl SwitchableGate {
    pub fn set_unready(&self, unready: bool) {
        self.unready.store(unready, Ordering::SeqCst);
    }
}

impl RegionGate for SwitchableGate {
    fn ensure_ready(&self, region: &Cuboid) -> RegionReadiness {
        if self.unready.load(Ordering::SeqCst) {
            RegionReadiness::Unready
        } else {
            self.world.ensure_ready(region)
        }
    }
}

/// Block surface that defers to the world but fails writes inside a chosen
/// region, either as unloaded or as rejected.
pub struct FlakySurface {
    pub world: Arc<InMemoryWorld>,
    failing: Mutex<Option<(Cuboid, bool)>>,
}

impl FlakySurface {
    pub fn new(world: Arc<InMemoryWorld>) -> Self {
        Self {
            world,
            failing: Mutex::new(None),
        }
    }

    pub fn fail_writes(&self, region: Cuboid, unloaded: bool) {
        *self.failing.lock().expect("lock") = Some((region, unloaded));
    }

    pub fn heal(&self) {
        *self.failing.lock().expect("lock") = None;
    }
}

impl BlockSurface for FlakySurface {
    fn get_block(&self, pos: BlockPos) -> Option<BlockDescriptor> {
        self.world.get_block(pos)
    }

    fn set_block(&self, pos: BlockPos, block: BlockDescriptor) -> Result<(), SurfaceError> {
        match *self.failing.lock().expect("lock") {
            Some((region, true)) if region.contains(pos) => Err(SurfaceError::Unloaded(pos)),
            Some((region, false)) if region.contains(pos) => Err(SurfaceError::Rejected {
                pos,
                reason: "protected by test".into(),
            }),
            _ => self.world.set_block(pos, block),
        }
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        tick_rate_hz: 20.0,
        min_steps: 5,
        hook_update_interval: 5,
        region_check_interval: 10,
        ..Default::default()
    }
}

pub fn make_fixture(config: EngineConfig) -> Fixture {
    make_fixture_with_chunks(config, 16)
}

pub fn make_fixture_with_chunks(config: EngineConfig, chunk_size: i32) -> Fixture {
    let world = Arc::new(InMemoryWorld::new(chunk_size));
    let store = Arc::new(InMemoryStore::new());
    let permissions = Arc::new(StaticPermissions::new());
    let gate = Arc::new(SwitchableGate {
        world: world.clone(),
        unready: AtomicBool::new(false),
    });
    let surface = Arc::new(FlakySurface::new(world.clone()));

    let engine = Engine::new(
        config,
        Collaborators {
            store: store.clone(),
            surface: surface.clone(),
            gate: gate.clone(),
            permissions: permissions.clone(),
        },
    );

    Fixture {
        engine,
        world,
        store,
        permissions,
        gate,
        surface,
    }
}

pub fn alice() -> ActorId {
    ActorId::new("alice")
}

pub fn mallory() -> ActorId {
    ActorId::new("mallory")
}

/// Place the structure's blocks, load a margin around it and store it.
pub fn add_structure(fx: &Fixture, structure: Structure) -> Structure {
    let c = structure.cuboid;
    fx.world
        .load_region(&Cuboid::new(c.min.offset(-16, -16, -16), c.max.offset(16, 16, 16)));
    fx.world.fill(&c, BlockDescriptor::new("oak_planks"));
    fx.store.insert(structure.clone());
    structure
}

/// 1 wide, 3 high, 4 long wall along z, hinged at the origin, opening clockwise.
pub fn door() -> Structure {
    Structure::new(
        DOOR_ID,
        StructureKind::Door,
        Cuboid::new(BlockPos::new(0, 0, 0), BlockPos::new(0, 2, 3)),
        BlockPos::new(0, 0, 0),
    )
    .with_direction(OpenDirection::Clockwise)
    .with_owner(alice(), PermissionTier::User)
}

/// 4 wide, 4 high gate that lifts by its own height.
pub fn portcullis() -> Structure {
    Structure::new(
        PORTCULLIS_ID,
        StructureKind::Portcullis,
        Cuboid::new(BlockPos::new(10, 10, 0), BlockPos::new(13, 13, 0)),
        BlockPos::new(10, 10, 0),
    )
    .with_direction(OpenDirection::Up)
    .with_owner(alice(), PermissionTier::Creator)
}

/// 8 long, 4 high flag along x, pole at its west end.
pub fn flag(formula: &str) -> Structure {
    let mut s = Structure::new(
        FLAG_ID,
        StructureKind::Flag,
        Cuboid::new(BlockPos::new(0, 20, 5), BlockPos::new(7, 23, 5)),
        BlockPos::new(0, 20, 5),
    )
    .with_owner(alice(), PermissionTier::User);
    s.config.formula = Some(formula.to_string());
    s
}
