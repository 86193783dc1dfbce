//! Geometry kernel and per-kind movement tests

#[cfg(test)]
mod tests {
    use animated_structures::{
        geometry::{cuboid_after_action, snap},
        kinds::{self, Motion},
        structure::{OpenDirection, Structure, StructureKind, StructureSnapshot},
        compute_cuboid_after_action, rotate_around_axis, Axis, BlockPos, Cuboid, ToggleAction, Vec3,
    };
    use std::f64::consts::{FRAC_PI_2, PI};

    fn make_cuboid(a: (i32, i32, i32), b: (i32, i32, i32)) -> Cuboid {
        Cuboid::new(BlockPos::new(a.0, a.1, a.2), BlockPos::new(b.0, b.1, b.2))
    }

    fn make_structure(kind: StructureKind, cuboid: Cuboid, engine: BlockPos, dir: OpenDirection) -> Structure {
        Structure::new(7, kind, cuboid, engine).with_direction(dir)
    }

    // -----------------------------------------------------------------------
    // Rotation
    // -----------------------------------------------------------------------

    #[test]
    fn rotation_round_trips() {
        let pivot = Vec3::new(3.0, -2.0, 5.0);
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(7.5, 1.25, -3.0),
            Vec3::new(-12.0, 40.0, 9.0),
        ];
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            for &theta in &[0.3, FRAC_PI_2, 2.0, -1.1, PI] {
                for &p in &points {
                    let there = rotate_around_axis(p, pivot, axis, theta);
                    let back = rotate_around_axis(there, pivot, axis, -theta);
                    assert!(back.max_abs_diff(p) < 1e-9, "{:?} {} {} -> {}", axis, theta, p, back);
                }
            }
        }
    }

    #[test]
    fn pivot_is_a_fixed_point() {
        let pivot = Vec3::new(1.0, 2.0, 3.0);
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let p = rotate_around_axis(pivot, pivot, axis, 1.234);
            assert!(p.max_abs_diff(pivot) < 1e-12);
        }
    }

    #[test]
    fn quarter_turn_around_y() {
        // a' = a·cos − b·sin on (x, z)
        let p = rotate_around_axis(Vec3::new(0.0, 4.0, 2.0), Vec3::zero(), Axis::Y, FRAC_PI_2);
        assert!(p.max_abs_diff(Vec3::new(-2.0, 4.0, 0.0)) < 1e-9);
    }

    #[test]
    fn four_quarter_turns_are_identity() {
        let origin = Vec3::new(5.0, 1.0, -3.0);
        let pivot = Vec3::new(1.0, 1.0, 1.0);
        let mut p = origin;
        for _ in 0..4 {
            p = rotate_around_axis(p, pivot, Axis::Z, FRAC_PI_2);
        }
        assert!(p.max_abs_diff(origin) < 1e-9);
    }

    #[test]
    fn snap_rounds_half_away_from_zero() {
        assert_eq!(snap(Vec3::new(0.5, -0.5, 1.49)), BlockPos::new(1, -1, 1));
        assert_eq!(snap(Vec3::new(-2.5, 2.5, -0.49)), BlockPos::new(-3, 3, 0));
        assert_eq!(snap(Vec3::new(1e-12, -1e-12, 3.0)), BlockPos::new(0, 0, 3));
    }

    // -----------------------------------------------------------------------
    // Cuboid
    // -----------------------------------------------------------------------

    #[test]
    fn cuboid_normalizes_corners() {
        let c = make_cuboid((4, 0, -1), (1, 3, -5));
        assert_eq!(c.min, BlockPos::new(1, 0, -5));
        assert_eq!(c.max, BlockPos::new(4, 3, -1));
        assert_eq!(c.dimensions(), (4, 4, 5));
        assert_eq!(c.volume(), 80);
        assert_eq!(c.positions().count(), 80);
    }

    #[test]
    fn cuboid_set_operations() {
        let a = make_cuboid((0, 0, 0), (3, 3, 3));
        let b = make_cuboid((2, 2, 2), (5, 5, 5));
        let c = make_cuboid((10, 0, 0), (11, 1, 1));

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.intersection(&b), Some(make_cuboid((2, 2, 2), (3, 3, 3))));
        assert_eq!(a.intersection(&c), None);
        assert_eq!(a.union(&c), make_cuboid((0, 0, 0), (11, 3, 3)));
        assert!(a.contains(BlockPos::new(3, 0, 3)));
        assert!(!a.contains(BlockPos::new(4, 0, 3)));
        assert_eq!(a.translate(BlockPos::new(1, -1, 0)), make_cuboid((1, -1, 0), (4, 2, 3)));
    }

    #[test]
    fn cuboid_quarter_rotation_preserves_volume() {
        let c = make_cuboid((0, 0, 0), (0, 2, 3));
        let r = c.rotate(BlockPos::new(0, 0, 0), Axis::Y, FRAC_PI_2);
        assert_eq!(r, make_cuboid((-3, 0, 0), (0, 2, 0)));
        assert_eq!(r.volume(), c.volume());
    }

    // -----------------------------------------------------------------------
    // Kinds
    // -----------------------------------------------------------------------

    #[test]
    fn door_accepts_only_rotational_directions() {
        let c = make_cuboid((0, 0, 0), (0, 2, 3));
        let door = make_structure(StructureKind::Door, c, BlockPos::new(0, 0, 0), OpenDirection::North);
        assert_eq!(kinds::movement_direction(&door), None);

        let door = make_structure(StructureKind::Door, c, BlockPos::new(0, 0, 0), OpenDirection::CounterClockwise);
        assert_eq!(kinds::movement_direction(&door), Some(OpenDirection::CounterClockwise));
    }

    #[test]
    fn open_structures_move_the_opposite_way() {
        let c = make_cuboid((0, 0, 0), (0, 2, 3));
        let mut door = make_structure(StructureKind::Door, c, BlockPos::new(0, 0, 0), OpenDirection::Clockwise);
        door.is_open = true;
        assert_eq!(kinds::movement_direction(&door), Some(OpenDirection::CounterClockwise));
    }

    #[test]
    fn drawbridge_falls_towards_its_direction() {
        let c = make_cuboid((0, 0, 0), (3, 4, 0));
        let bridge = make_structure(StructureKind::Drawbridge, c, BlockPos::new(0, 0, 0), OpenDirection::North);
        assert_eq!(
            cuboid_after_action(&bridge, ToggleAction::Open),
            Some(make_cuboid((0, 0, -4), (3, 0, 0)))
        );

        let bridge = make_structure(StructureKind::Drawbridge, c, BlockPos::new(0, 0, 0), OpenDirection::Up);
        assert_eq!(cuboid_after_action(&bridge, ToggleAction::Open), None);
    }

    #[test]
    fn portcullis_lifts_by_its_height_and_engine_follows() {
        let c = make_cuboid((10, 10, 0), (13, 13, 0));
        let gate = make_structure(StructureKind::Portcullis, c, BlockPos::new(10, 10, 0), OpenDirection::None);
        assert_eq!(kinds::movement_direction(&gate), Some(OpenDirection::Up));

        let motion = kinds::motion_for(&gate, OpenDirection::Up).expect("lift motion");
        assert_eq!(
            motion,
            Motion::Translate {
                delta: BlockPos::new(0, 4, 0)
            }
        );
        let spec = kinds::spec(StructureKind::Portcullis);
        assert_eq!(
            motion.apply_to_engine(gate.engine, spec.engine_follows),
            BlockPos::new(10, 14, 0)
        );
    }

    #[test]
    fn zero_distance_has_no_motion() {
        let c = make_cuboid((0, 0, 0), (2, 5, 2));
        let mut lift = make_structure(StructureKind::Elevator, c, BlockPos::new(0, 0, 0), OpenDirection::Up);
        lift.config.blocks_to_move = Some(0);
        assert_eq!(kinds::motion_for(&lift, OpenDirection::Up), None);
        assert_eq!(cuboid_after_action(&lift, ToggleAction::Toggle), None);
    }

    #[test]
    fn sliding_door_infers_direction_from_extent() {
        let c = make_cuboid((0, 0, 0), (2, 1, 0));
        let slider = make_structure(StructureKind::SlidingDoor, c, BlockPos::new(0, 0, 0), OpenDirection::None);
        assert_eq!(kinds::movement_direction(&slider), Some(OpenDirection::East));
        assert_eq!(
            cuboid_after_action(&slider, ToggleAction::Open),
            Some(make_cuboid((3, 0, 0), (5, 1, 0)))
        );

        let square = make_cuboid((0, 0, 0), (2, 1, 2));
        let slider = make_structure(StructureKind::SlidingDoor, square, BlockPos::new(0, 0, 0), OpenDirection::None);
        assert_eq!(kinds::movement_direction(&slider), None);
    }

    #[test]
    fn flag_bounds_do_not_change() {
        let c = make_cuboid((0, 20, 5), (7, 23, 5));
        let flag = make_structure(StructureKind::Flag, c, BlockPos::new(0, 20, 5), OpenDirection::None);
        assert_eq!(cuboid_after_action(&flag, ToggleAction::Toggle), Some(c));
    }

    // -----------------------------------------------------------------------
    // compute_cuboid_after_action
    // -----------------------------------------------------------------------

    #[test]
    fn cuboid_after_action_respects_current_state() {
        let c = make_cuboid((0, 0, 0), (0, 2, 3));
        let door = make_structure(StructureKind::Door, c, BlockPos::new(0, 0, 0), OpenDirection::Clockwise);
        let snapshot = StructureSnapshot::new(door.clone(), Vec::new());

        assert_eq!(compute_cuboid_after_action(&snapshot, ToggleAction::Close), None);
        let opened = compute_cuboid_after_action(&snapshot, ToggleAction::Open).expect("door opens");
        assert_eq!(opened, make_cuboid((-3, 0, 0), (0, 2, 0)));

        let mut open_door = door;
        open_door.cuboid = opened;
        open_door.is_open = true;
        let snapshot = StructureSnapshot::new(open_door, Vec::new());
        assert_eq!(compute_cuboid_after_action(&snapshot, ToggleAction::Open), None);
        assert_eq!(compute_cuboid_after_action(&snapshot, ToggleAction::Toggle), Some(c));
    }
}
