//! Per-block trajectories: where every block of a snapshot sits at step `n`.

use crate::error::FormulaError;
use crate::formula::Formula;
use crate::geometry::{rotate_around_axis, snap, Cuboid};
use crate::kinds::{self, Motion};
use crate::structure::{OpenDirection, SnapshotBlock, StructureSnapshot};
use crate::types::{Axis, BlockPos, Vec3};

/// A block position plus the rotation it has undergone so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedPosition {
    pub position: Vec3,
    pub angle: f64,
}

/// The full movement plan of one animation, computed once in preparation.
#[derive(Debug, Clone)]
pub struct Trajectory {
    direction: OpenDirection,
    motion: Motion,
    total_steps: u32,
    engine: BlockPos,
    cuboid: Cuboid,
    /// Parsed movement formula for waving kinds; a parse failure is kept
    /// and reported for every block instead of aborting.
    formula: Option<Result<Formula, FormulaError>>,
}

impl Trajectory {
    pub fn new(snapshot: &StructureSnapshot, direction: OpenDirection, total_steps: u32) -> Option<Self> {
        let structure = snapshot.structure();
        let motion = kinds::motion_for(structure, direction)?;

        let formula = match motion {
            Motion::Wave { .. } => structure
                .config
                .formula
                .as_deref()
                .or(kinds::spec(structure.kind).default_formula)
                .map(Formula::parse),
            _ => None,
        };

        Some(Self {
            direction,
            motion,
            total_steps: total_steps.max(1),
            engine: structure.engine,
            cuboid: structure.cuboid,
            formula,
        })
    }

    pub fn direction(&self) -> OpenDirection {
        self.direction
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    /// Position of `block` after `step` of `total_steps` steps.
    ///
    /// A formula failure yields zero displacement for this block and is
    /// returned alongside the position.
    pub fn position_at(&self, block: &SnapshotBlock, step: u32) -> (RotatedPosition, Option<FormulaError>) {
        let progress = (step.min(self.total_steps)) as f64 / self.total_steps as f64;
        let origin = Vec3::from(block.origin);

        match self.motion {
            Motion::Rotate { axis, radians } => {
                let angle = radians * progress;
                let position = rotate_around_axis(origin, self.engine.into(), axis, angle);
                (RotatedPosition { position, angle }, None)
            }
            Motion::Translate { delta } => {
                let position = origin + Vec3::from(delta).scale(progress);
                (RotatedPosition { position, angle: 0.0 }, None)
            }
            Motion::Wave { along, across } => {
                let (displacement, fault) = match self.wave_displacement(block.origin, along, step) {
                    Ok(d) => (d, None),
                    Err(e) => (0.0, Some(e)),
                };
                let position = origin + unit(across).scale(displacement);
                (RotatedPosition { position, angle: 0.0 }, fault)
            }
        }
    }

    /// Where `block` rests once the animation is complete.
    pub fn final_position(&self, block: &SnapshotBlock) -> BlockPos {
        match self.motion {
            Motion::Rotate { axis, radians } => snap(rotate_around_axis(
                block.origin.into(),
                self.engine.into(),
                axis,
                radians,
            )),
            Motion::Translate { delta } => block.origin.offset(delta.x, delta.y, delta.z),
            Motion::Wave { .. } => block.origin,
        }
    }

    fn wave_displacement(&self, origin: BlockPos, along: Axis, step: u32) -> Result<f64, FormulaError> {
        let formula = match &self.formula {
            None => return Ok(0.0),
            Some(Err(e)) => return Err(e.clone()),
            Some(Ok(f)) => f,
        };

        let (dx, _, dz) = self.cuboid.dimensions();
        let (radius, length) = match along {
            Axis::X => ((origin.x - self.engine.x).abs(), dx),
            _ => ((origin.z - self.engine.z).abs(), dz),
        };
        let height = origin.y - self.cuboid.min.y;

        formula.evaluate(&[
            ("radius", radius as f64),
            ("counter", step as f64),
            ("length", length as f64),
            ("height", height as f64),
        ])
    }
}

fn unit(axis: Axis) -> Vec3 {
    match axis {
        Axis::X => Vec3::new(1.0, 0.0, 0.0),
        Axis::Y => Vec3::new(0.0, 1.0, 0.0),
        Axis::Z => Vec3::new(0.0, 0.0, 1.0),
    }
}
