//! Structure subsystem: the persisted structure record, its kinds and
//! directions, and the immutable snapshot an animation computes against.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::geometry::Cuboid;
use crate::types::BlockPos;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureId(pub u64);

impl std::fmt::Display for StructureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a player or other actor that can own or toggle structures.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// Ownership tier. Lower is more privileged.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionTier {
    Creator = 0,
    Admin = 1,
    User = 2,
}

impl PermissionTier {
    pub fn satisfies(self, required: PermissionTier) -> bool {
        self <= required
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub actor: ActorId,
    pub tier: PermissionTier,
}

/// Something an actor may be allowed to do with a structure.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureAttribute {
    Toggle,
    Lock,
}

impl StructureAttribute {
    pub fn required_tier(self) -> PermissionTier {
        match self {
            StructureAttribute::Toggle => PermissionTier::User,
            StructureAttribute::Lock => PermissionTier::Admin,
        }
    }
}

// ---------------------------------------------------------------------------
// Kinds & directions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Door,
    Drawbridge,
    Portcullis,
    Elevator,
    SlidingDoor,
    Flag,
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenDirection {
    North,
    East,
    South,
    West,
    Up,
    Down,
    Clockwise,
    CounterClockwise,
    None,
}

impl OpenDirection {
    pub fn opposite(self) -> Self {
        match self {
            OpenDirection::North => OpenDirection::South,
            OpenDirection::South => OpenDirection::North,
            OpenDirection::East => OpenDirection::West,
            OpenDirection::West => OpenDirection::East,
            OpenDirection::Up => OpenDirection::Down,
            OpenDirection::Down => OpenDirection::Up,
            OpenDirection::Clockwise => OpenDirection::CounterClockwise,
            OpenDirection::CounterClockwise => OpenDirection::Clockwise,
            OpenDirection::None => OpenDirection::None,
        }
    }

    pub fn is_cardinal(self) -> bool {
        matches!(
            self,
            OpenDirection::North | OpenDirection::East | OpenDirection::South | OpenDirection::West
        )
    }

    /// Unit step of a cardinal or vertical direction (north is -z, east is +x).
    pub fn unit(self) -> Option<BlockPos> {
        match self {
            OpenDirection::North => Some(BlockPos::new(0, 0, -1)),
            OpenDirection::South => Some(BlockPos::new(0, 0, 1)),
            OpenDirection::East => Some(BlockPos::new(1, 0, 0)),
            OpenDirection::West => Some(BlockPos::new(-1, 0, 0)),
            OpenDirection::Up => Some(BlockPos::new(0, 1, 0)),
            OpenDirection::Down => Some(BlockPos::new(0, -1, 0)),
            _ => None,
        }
    }
}

/// Kind-specific settings. Unset fields fall back to the kind's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindConfig {
    /// Movement formula for waving kinds.
    pub formula: Option<String>,
    /// Translation distance for sliding and lifting kinds.
    pub blocks_to_move: Option<i32>,
    /// Preferred animation duration.
    pub duration_secs: Option<f64>,
}

// ---------------------------------------------------------------------------
// Structure record
// ---------------------------------------------------------------------------

/// A persisted, animatable structure (door, drawbridge, flag …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub id: StructureId,
    pub name: String,
    pub kind: StructureKind,
    #[serde(default)]
    pub owners: Vec<Owner>,
    pub cuboid: Cuboid,
    /// Pivot / engine point the blocks rotate or translate around.
    pub engine: BlockPos,
    pub open_direction: OpenDirection,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub locked: bool,
    /// Close again automatically this many seconds after opening.
    #[serde(default)]
    pub auto_close_secs: Option<f64>,
    /// Per-structure block cap; the engine-wide cap still applies.
    #[serde(default)]
    pub block_limit: Option<usize>,
    #[serde(default)]
    pub config: KindConfig,
}

impl Structure {
    pub fn new(id: u64, kind: StructureKind, cuboid: Cuboid, engine: BlockPos) -> Self {
        Self {
            id: StructureId(id),
            name: format!("{:?}-{}", kind, id).to_lowercase(),
            kind,
            owners: Vec::new(),
            cuboid,
            engine,
            open_direction: OpenDirection::None,
            is_open: false,
            locked: false,
            auto_close_secs: None,
            block_limit: None,
            config: KindConfig::default(),
        }
    }

    pub fn with_owner(mut self, actor: ActorId, tier: PermissionTier) -> Self {
        self.owners.push(Owner { actor, tier });
        self
    }

    pub fn with_direction(mut self, direction: OpenDirection) -> Self {
        self.open_direction = direction;
        self
    }

    /// Best tier the actor holds on this structure, if they own it at all.
    pub fn owner_tier(&self, actor: &ActorId) -> Option<PermissionTier> {
        self.owners
            .iter()
            .filter(|o| &o.actor == actor)
            .map(|o| o.tier)
            .min()
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Opaque description of a block: material plus serialized block state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub material: String,
    #[serde(default)]
    pub data: Bytes,
}

impl BlockDescriptor {
    pub const AIR: &'static str = "air";

    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            data: Bytes::new(),
        }
    }

    pub fn air() -> Self {
        Self::new(Self::AIR)
    }

    pub fn is_air(&self) -> bool {
        self.material == Self::AIR
    }
}

/// One block of a structure as captured at toggle time.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotBlock {
    pub origin: BlockPos,
    pub block: BlockDescriptor,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable copy of a structure and its block layout, taken once per toggle.
///
/// Cloning is cheap; every clone shares the same captured data.
#[derive(Debug, Clone)]
pub struct StructureSnapshot {
    inner: Arc<SnapshotInner>,
}

#[derive(Debug)]
struct SnapshotInner {
    structure: Structure,
    blocks: Vec<SnapshotBlock>,
    fingerprint: String,
}

impl StructureSnapshot {
    pub fn new(structure: Structure, mut blocks: Vec<SnapshotBlock>) -> Self {
        blocks.sort_by_key(|b| b.origin);
        let fingerprint = layout_fingerprint(blocks.iter().map(|b| (b.origin, &b.block)));
        Self {
            inner: Arc::new(SnapshotInner {
                structure,
                blocks,
                fingerprint,
            }),
        }
    }

    pub fn structure(&self) -> &Structure {
        &self.inner.structure
    }

    pub fn id(&self) -> StructureId {
        self.inner.structure.id
    }

    pub fn kind(&self) -> StructureKind {
        self.inner.structure.kind
    }

    pub fn cuboid(&self) -> Cuboid {
        self.inner.structure.cuboid
    }

    pub fn blocks(&self) -> &[SnapshotBlock] {
        &self.inner.blocks
    }

    pub fn block_count(&self) -> usize {
        self.inner.blocks.len()
    }

    /// MD5 of the captured layout, stable for identical layouts.
    pub fn fingerprint(&self) -> &str {
        &self.inner.fingerprint
    }
}

/// Hash a set of placed blocks. Input must already be in a stable order.
pub fn layout_fingerprint<'a>(blocks: impl Iterator<Item = (BlockPos, &'a BlockDescriptor)>) -> String {
    let mut buf = Vec::new();
    for (pos, block) in blocks {
        buf.extend_from_slice(&pos.x.to_le_bytes());
        buf.extend_from_slice(&pos.y.to_le_bytes());
        buf.extend_from_slice(&pos.z.to_le_bytes());
        buf.extend_from_slice(block.material.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&block.data);
        buf.push(0);
    }
    format!("{:x}", md5::compute(&buf))
}
