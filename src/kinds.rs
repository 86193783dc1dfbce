//! Per-kind movement rules.
//!
//! Each [`StructureKind`] maps to one static [`KindSpec`]: a handful of pure
//! functions and defaults. Adding a kind means adding a table entry, not a
//! new type.

use std::f64::consts::FRAC_PI_2;

use crate::geometry::Cuboid;
use crate::structure::{OpenDirection, Structure, StructureKind};
use crate::types::{Axis, BlockPos};

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// How a structure's blocks travel during one animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    /// Quarter turn (or any angle) around the engine point.
    Rotate { axis: Axis, radians: f64 },
    /// Straight-line move by a whole number of blocks.
    Translate { delta: BlockPos },
    /// Per-block displacement across `across`, driven by the movement
    /// formula; blocks come back to rest where they started.
    Wave { along: Axis, across: Axis },
}

impl Motion {
    pub fn apply_to_cuboid(&self, cuboid: Cuboid, engine: BlockPos) -> Cuboid {
        match *self {
            Motion::Rotate { axis, radians } => cuboid.rotate(engine, axis, radians),
            Motion::Translate { delta } => cuboid.translate(delta),
            Motion::Wave { .. } => cuboid,
        }
    }

    /// Engine point after the move, for kinds whose engine travels along.
    pub fn apply_to_engine(&self, engine: BlockPos, follows: bool) -> BlockPos {
        match *self {
            Motion::Translate { delta } if follows => engine.offset(delta.x, delta.y, delta.z),
            _ => engine,
        }
    }
}

// ---------------------------------------------------------------------------
// Kind table
// ---------------------------------------------------------------------------

pub struct KindSpec {
    pub kind: StructureKind,
    /// Stored open direction, validated or inferred for this kind.
    pub resolve: fn(&Structure) -> Option<OpenDirection>,
    /// Motion that moves the structure in the given direction.
    pub motion: fn(&Structure, OpenDirection) -> Option<Motion>,
    pub default_duration_secs: f64,
    /// Whether the engine point moves with the blocks.
    pub engine_follows: bool,
    pub default_formula: Option<&'static str>,
}

static DOOR: KindSpec = KindSpec {
    kind: StructureKind::Door,
    resolve: resolve_rotational,
    motion: door_motion,
    default_duration_secs: 3.0,
    engine_follows: false,
    default_formula: None,
};

static DRAWBRIDGE: KindSpec = KindSpec {
    kind: StructureKind::Drawbridge,
    resolve: resolve_cardinal,
    motion: drawbridge_motion,
    default_duration_secs: 5.0,
    engine_follows: false,
    default_formula: None,
};

static PORTCULLIS: KindSpec = KindSpec {
    kind: StructureKind::Portcullis,
    resolve: resolve_vertical,
    motion: lift_motion,
    default_duration_secs: 4.0,
    engine_follows: true,
    default_formula: None,
};

static ELEVATOR: KindSpec = KindSpec {
    kind: StructureKind::Elevator,
    resolve: resolve_vertical,
    motion: lift_motion,
    default_duration_secs: 6.0,
    engine_follows: true,
    default_formula: None,
};

static SLIDING_DOOR: KindSpec = KindSpec {
    kind: StructureKind::SlidingDoor,
    resolve: resolve_horizontal,
    motion: slide_motion,
    default_duration_secs: 3.0,
    engine_follows: true,
    default_formula: None,
};

static FLAG: KindSpec = KindSpec {
    kind: StructureKind::Flag,
    resolve: resolve_horizontal,
    motion: wave_motion,
    default_duration_secs: 10.0,
    engine_follows: false,
    default_formula: Some("min(0.08 * radius + 0.1, 1.5) * sin(radius / 1.7 + counter / 12)"),
};

pub fn spec(kind: StructureKind) -> &'static KindSpec {
    match kind {
        StructureKind::Door => &DOOR,
        StructureKind::Drawbridge => &DRAWBRIDGE,
        StructureKind::Portcullis => &PORTCULLIS,
        StructureKind::Elevator => &ELEVATOR,
        StructureKind::SlidingDoor => &SLIDING_DOOR,
        StructureKind::Flag => &FLAG,
    }
}

/// Direction the next toggle moves the structure in.
///
/// Opening follows the stored direction, closing an open structure reverses it.
pub fn movement_direction(structure: &Structure) -> Option<OpenDirection> {
    let stored = (spec(structure.kind).resolve)(structure)?;
    Some(if structure.is_open { stored.opposite() } else { stored })
}

pub fn motion_for(structure: &Structure, direction: OpenDirection) -> Option<Motion> {
    (spec(structure.kind).motion)(structure, direction)
}

// ---------------------------------------------------------------------------
// Direction rules
// ---------------------------------------------------------------------------

fn resolve_rotational(s: &Structure) -> Option<OpenDirection> {
    match s.open_direction {
        d @ (OpenDirection::Clockwise | OpenDirection::CounterClockwise) => Some(d),
        _ => None,
    }
}

fn resolve_cardinal(s: &Structure) -> Option<OpenDirection> {
    s.open_direction.is_cardinal().then_some(s.open_direction)
}

fn resolve_vertical(s: &Structure) -> Option<OpenDirection> {
    match s.open_direction {
        d @ (OpenDirection::Up | OpenDirection::Down) => Some(d),
        OpenDirection::None => Some(OpenDirection::Up),
        _ => None,
    }
}

/// Cardinal direction, or inferred from the longer horizontal extent.
fn resolve_horizontal(s: &Structure) -> Option<OpenDirection> {
    if s.open_direction.is_cardinal() {
        return Some(s.open_direction);
    }
    if s.open_direction != OpenDirection::None {
        return None;
    }
    let (dx, _, dz) = s.cuboid.dimensions();
    match dx.cmp(&dz) {
        std::cmp::Ordering::Greater => Some(OpenDirection::East),
        std::cmp::Ordering::Less => Some(OpenDirection::South),
        std::cmp::Ordering::Equal => None,
    }
}

// ---------------------------------------------------------------------------
// Motion rules
// ---------------------------------------------------------------------------

fn door_motion(_: &Structure, direction: OpenDirection) -> Option<Motion> {
    let radians = match direction {
        OpenDirection::Clockwise => FRAC_PI_2,
        OpenDirection::CounterClockwise => -FRAC_PI_2,
        _ => return None,
    };
    Some(Motion::Rotate {
        axis: Axis::Y,
        radians,
    })
}

/// The free edge falls towards `direction`, hinged on the engine line.
fn drawbridge_motion(_: &Structure, direction: OpenDirection) -> Option<Motion> {
    let (axis, radians) = match direction {
        OpenDirection::North => (Axis::X, -FRAC_PI_2),
        OpenDirection::South => (Axis::X, FRAC_PI_2),
        OpenDirection::West => (Axis::Z, FRAC_PI_2),
        OpenDirection::East => (Axis::Z, -FRAC_PI_2),
        _ => return None,
    };
    Some(Motion::Rotate { axis, radians })
}

fn lift_motion(s: &Structure, direction: OpenDirection) -> Option<Motion> {
    let unit = direction.unit().filter(|u| u.y != 0)?;
    let (_, dy, _) = s.cuboid.dimensions();
    let distance = distance_or(s, dy)?;
    Some(Motion::Translate {
        delta: BlockPos::new(0, unit.y * distance, 0),
    })
}

fn slide_motion(s: &Structure, direction: OpenDirection) -> Option<Motion> {
    if !direction.is_cardinal() {
        return None;
    }
    let unit = direction.unit()?;
    let (dx, _, dz) = s.cuboid.dimensions();
    let extent = if unit.x != 0 { dx } else { dz };
    let distance = distance_or(s, extent)?;
    Some(Motion::Translate {
        delta: BlockPos::new(unit.x * distance, 0, unit.z * distance),
    })
}

fn wave_motion(_: &Structure, direction: OpenDirection) -> Option<Motion> {
    match direction {
        OpenDirection::East | OpenDirection::West => Some(Motion::Wave {
            along: Axis::X,
            across: Axis::Z,
        }),
        OpenDirection::North | OpenDirection::South => Some(Motion::Wave {
            along: Axis::Z,
            across: Axis::X,
        }),
        _ => None,
    }
}

/// Configured `blocks_to_move`, else `fallback`. Non-positive distances are invalid.
fn distance_or(s: &Structure, fallback: i32) -> Option<i32> {
    let d = s.config.blocks_to_move.unwrap_or(fallback);
    (d > 0).then_some(d)
}
