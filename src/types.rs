//! Core engine types shared across all modules.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::structure::StructureKind;

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Largest per-axis difference; used for tolerance comparisons.
    pub fn max_abs_diff(self, other: Vec3) -> f64 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;

    fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl From<BlockPos> for Vec3 {
    fn from(p: BlockPos) -> Self {
        Self::new(p.x as f64, p.y as f64, p.z as f64)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Block grid
// ---------------------------------------------------------------------------

/// Integer block coordinate in the world grid.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

/// One of the three world axes. `Y` is vertical.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
    Z,
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub active_animations: usize,
    pub total_started: u64,
    pub total_completed: u64,
    pub total_aborted: u64,
    pub total_steps: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Animation step cadence in steps per second.
    pub tick_rate_hz: f64,
    /// Floor on the number of running steps of a non-skipped animation.
    pub min_steps: u32,
    /// Upper bound on any animation's duration, override included.
    pub max_duration_secs: f64,
    /// Step hooks fire every this many steps.
    pub hook_update_interval: u32,
    /// Region readiness is re-checked every this many steps.
    pub region_check_interval: u32,
    /// How long a pending permission answer is awaited.
    pub permission_timeout_ms: u64,
    /// Global cap on blocks per structure; a structure's own limit may lower it.
    pub max_block_count: usize,
    /// Kinds that may not be toggled at all.
    pub disabled_kinds: HashSet<StructureKind>,
    /// Number of lock shards in the activity registry.
    pub registry_shards: usize,
}

impl EngineConfig {
    /// Step rate actually used, kept within 1..=1000 Hz.
    pub fn tick_rate(&self) -> f64 {
        if self.tick_rate_hz.is_nan() {
            1.0
        } else {
            self.tick_rate_hz.clamp(1.0, 1000.0)
        }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.tick_rate())
    }

    /// `max_duration_secs` as a duration; out of range values saturate.
    pub fn max_duration(&self) -> std::time::Duration {
        std::time::Duration::try_from_secs_f64(self.max_duration_secs.max(0.0))
            .unwrap_or(std::time::Duration::MAX)
    }

    pub fn kind_enabled(&self, kind: StructureKind) -> bool {
        !self.disabled_kinds.contains(&kind)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20.0,
            min_steps: 5,
            max_duration_secs: 60.0,
            hook_update_interval: 5,
            region_check_interval: 10,
            permission_timeout_ms: 2000,
            max_block_count: 1000,
            disabled_kinds: HashSet::new(),
            registry_shards: 16,
        }
    }
}
