//! Geometry kernel: rotation around a pivot, cuboid bounds, snapping.
//!
//! Everything here is pure. Positions are block coordinates; a block at
//! `(x, y, z)` rotates around the pivot block's coordinate, so quarter turns
//! map the integer grid onto itself.

use serde::{Deserialize, Serialize};

use crate::kinds;
use crate::request::ToggleAction;
use crate::structure::{Structure, StructureSnapshot};
use crate::types::{Axis, BlockPos, Vec3};

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Rotate `point` by `radians` around the line through `pivot` parallel to `axis`.
///
/// The two coordinates orthogonal to the axis are rotated as `(a, b)` with
/// `a' = a·cos − b·sin`, `b' = a·sin + b·cos`, using `(y, z)` for X, `(x, z)`
/// for Y and `(x, y)` for Z.
pub fn rotate_around_axis(point: Vec3, pivot: Vec3, axis: Axis, radians: f64) -> Vec3 {
    let rel = point - pivot;
    let (sin, cos) = radians.sin_cos();
    let turn = |a: f64, b: f64| (a * cos - b * sin, a * sin + b * cos);

    let rotated = match axis {
        Axis::X => {
            let (y, z) = turn(rel.y, rel.z);
            Vec3::new(rel.x, y, z)
        }
        Axis::Y => {
            let (x, z) = turn(rel.x, rel.z);
            Vec3::new(x, rel.y, z)
        }
        Axis::Z => {
            let (x, y) = turn(rel.x, rel.y);
            Vec3::new(x, y, rel.z)
        }
    };

    rotated + pivot
}

/// Snap to the nearest block, rounding halves away from zero.
pub fn snap(v: Vec3) -> BlockPos {
    // f64::round already rounds half away from zero.
    BlockPos::new(v.x.round() as i32, v.y.round() as i32, v.z.round() as i32)
}

// ---------------------------------------------------------------------------
// Cuboid
// ---------------------------------------------------------------------------

/// Axis-aligned block region with inclusive corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cuboid {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl Cuboid {
    /// Build from any two opposite corners.
    pub fn new(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Block counts along x, y and z.
    pub fn dimensions(&self) -> (i32, i32, i32) {
        (
            self.max.x - self.min.x + 1,
            self.max.y - self.min.y + 1,
            self.max.z - self.min.z + 1,
        )
    }

    pub fn volume(&self) -> u64 {
        let (dx, dy, dz) = self.dimensions();
        dx as u64 * dy as u64 * dz as u64
    }

    pub fn contains(&self, p: BlockPos) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn intersects(&self, other: &Cuboid) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn intersection(&self, other: &Cuboid) -> Option<Cuboid> {
        if !self.intersects(other) {
            return None;
        }
        Some(Cuboid {
            min: BlockPos::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            max: BlockPos::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        })
    }

    /// Smallest cuboid enclosing both.
    pub fn union(&self, other: &Cuboid) -> Cuboid {
        Cuboid {
            min: BlockPos::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: BlockPos::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    pub fn translate(&self, delta: BlockPos) -> Cuboid {
        Cuboid {
            min: self.min.offset(delta.x, delta.y, delta.z),
            max: self.max.offset(delta.x, delta.y, delta.z),
        }
    }

    pub fn corners(&self) -> [BlockPos; 8] {
        let (a, b) = (self.min, self.max);
        [
            BlockPos::new(a.x, a.y, a.z),
            BlockPos::new(b.x, a.y, a.z),
            BlockPos::new(a.x, b.y, a.z),
            BlockPos::new(a.x, a.y, b.z),
            BlockPos::new(b.x, b.y, a.z),
            BlockPos::new(b.x, a.y, b.z),
            BlockPos::new(a.x, b.y, b.z),
            BlockPos::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of this cuboid after rotating all corners around `pivot`.
    pub fn rotate(&self, pivot: BlockPos, axis: Axis, radians: f64) -> Cuboid {
        let pivot = Vec3::from(pivot);
        let mut corners = self
            .corners()
            .into_iter()
            .map(|c| snap(rotate_around_axis(c.into(), pivot, axis, radians)));
        // corners() always yields eight entries
        let first = corners.next().unwrap_or(self.min);
        corners.fold(Cuboid::new(first, first), |acc, c| {
            acc.union(&Cuboid::new(c, c))
        })
    }

    /// Every block position inside, x fastest, then z, then y.
    pub fn positions(&self) -> impl Iterator<Item = BlockPos> + '_ {
        (self.min.y..=self.max.y).flat_map(move |y| {
            (self.min.z..=self.max.z)
                .flat_map(move |z| (self.min.x..=self.max.x).map(move |x| BlockPos::new(x, y, z)))
        })
    }
}

impl std::fmt::Display for Cuboid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}

// ---------------------------------------------------------------------------
// Action outcome
// ---------------------------------------------------------------------------

/// Bounds the structure will occupy once `action` has been carried out.
///
/// `None` when the action does not apply to the structure's current state or
/// no direction resolves for its kind.
pub fn compute_cuboid_after_action(snapshot: &StructureSnapshot, action: ToggleAction) -> Option<Cuboid> {
    cuboid_after_action(snapshot.structure(), action)
}

/// Same as [`compute_cuboid_after_action`] for a live structure record.
pub fn cuboid_after_action(structure: &Structure, action: ToggleAction) -> Option<Cuboid> {
    if !action.applies_to(structure.is_open) {
        return None;
    }
    let direction = kinds::movement_direction(structure)?;
    let motion = kinds::motion_for(structure, direction)?;
    Some(motion.apply_to_cuboid(structure.cuboid, structure.engine))
}
