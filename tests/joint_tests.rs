use approx::assert_abs_diff_eq;
use ragdoll_accelerator::dynamics::clamp_to_ellipse;
use ragdoll_accelerator::*;

const DT: f32 = 1.0 / 60.0;
const GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -10.0);

fn block() -> BodyDesc {
    BodyDesc::from_colliders(vec![Collider::cuboid(Vec3::new(0.5, 0.2, 0.2))], 500.0)
}

fn ball() -> BodyDesc {
    BodyDesc::from_colliders(vec![Collider::sphere(0.3)], 1000.0)
}

fn at(x: f32, z: f32) -> Transform {
    Transform::from_position(Vec3::new(x, 0.0, z))
}

#[test]
fn joint_without_constraints_is_discarded() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let a = sim.create_dynamic_actor(&ball(), Transform::IDENTITY);
    let b = sim.create_dynamic_actor(&ball(), at(1.0, 0.0));

    let joint = sim.create_joint(&JointDesc::default(), &a, Some(&b)).unwrap();
    assert!(joint.is_none());
    assert_eq!(sim.num_joints(), 0);
}

#[test]
fn fully_locked_pair_keeps_its_relative_pose() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let a = sim.create_dynamic_actor(&block(), at(0.0, 5.0));
    let b = sim.create_dynamic_actor(&block(), at(1.0, 5.0));
    sim.set_ignore_collision_pair_table(&[(&a, &b)]).unwrap();

    let desc = JointDesc::fixed(at(0.5, 0.0), at(-0.5, 0.0));
    sim.create_joint(&desc, &a, Some(&b)).unwrap().unwrap();

    let initial = sim
        .body(&a)
        .unwrap()
        .world_transform()
        .inverse_combine(&sim.body(&b).unwrap().world_transform());
    sim.body_mut(&b).unwrap().set_angular_velocity(Vec3::new(0.0, 2.0, 0.0));

    for _ in 0..60 {
        sim.simulate(DT, GRAVITY);
    }

    let relative = sim
        .body(&a)
        .unwrap()
        .world_transform()
        .inverse_combine(&sim.body(&b).unwrap().world_transform());
    assert!(
        relative.abs_diff_eq(&initial, 2e-2),
        "relative pose drifted: {relative:?} vs {initial:?}"
    );
    assert!(sim.body(&a).unwrap().world_transform().position.z < 5.0);
}

#[test]
fn pendulum_keeps_its_length() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let pivot = sim.create_static_actor(&[], at(0.0, 5.0));
    let bob = sim.create_dynamic_actor(&ball(), at(1.0, 5.0));

    let desc = JointDesc::spherical(Transform::IDENTITY, at(-1.0, 0.0));
    sim.create_joint(&desc, &pivot, Some(&bob)).unwrap().unwrap();

    let mut lowest = f32::MAX;
    for _ in 0..120 {
        sim.simulate(DT, GRAVITY);
        let position = sim.body(&bob).unwrap().world_transform().position;
        let length = (position - Vec3::new(0.0, 0.0, 5.0)).length();
        assert_abs_diff_eq!(length, 1.0, epsilon = 0.05);
        lowest = lowest.min(position.z);
    }
    assert!(lowest < 4.5, "pendulum never swung down");
}

#[test]
fn world_anchored_joint_holds_a_body_in_place() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let body = sim.create_dynamic_actor(&ball(), at(0.0, 3.0));
    let desc = JointDesc::fixed(Transform::IDENTITY, at(0.0, 3.0));
    sim.create_joint(&desc, &body, None).unwrap().unwrap();

    for _ in 0..60 {
        sim.simulate(DT, GRAVITY);
    }
    let position = sim.body(&body).unwrap().world_transform().position;
    assert_abs_diff_eq!(position.z, 3.0, epsilon = 0.01);
}

#[test]
fn slerp_drive_turns_towards_its_target() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let anchor = sim.create_static_actor(&[], Transform::IDENTITY);
    let body = sim.create_dynamic_actor(&ball(), Transform::IDENTITY);

    let desc = JointDesc::spherical(Transform::IDENTITY, Transform::IDENTITY)
        .with_drive(D6Drive::Slerp, JointDrive::new(100.0, 20.0));
    let joint = sim.create_joint(&desc, &anchor, Some(&body)).unwrap().unwrap();
    assert!(sim.joint(&joint).unwrap().is_driving(D6Drive::Slerp));

    let target = Quat::from_rotation_z(0.5);
    sim.joint_mut(&joint)
        .unwrap()
        .set_drive_target(Transform::from_rotation(target));

    for _ in 0..120 {
        sim.simulate(DT, Vec3::ZERO);
    }
    let rotation = sim.body(&body).unwrap().world_transform().rotation;
    assert!(rotation.angle_between(target) < 0.05, "rotation {rotation:?}");
}

#[test]
fn twist_limit_stops_a_spinning_body() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let anchor = sim.create_static_actor(&[], Transform::IDENTITY);
    let body = sim.create_dynamic_actor(&ball(), Transform::IDENTITY);

    let desc = JointDesc::fixed(Transform::IDENTITY, Transform::IDENTITY)
        .with_motion(D6Axis::Twist, D6Motion::Limited)
        .with_twist_limit(AngularLimitPair {
            lower: -0.3,
            upper: 0.3,
            ..AngularLimitPair::default()
        });
    sim.create_joint(&desc, &anchor, Some(&body)).unwrap().unwrap();
    sim.body_mut(&body)
        .unwrap()
        .set_angular_velocity(Vec3::new(3.0, 0.0, 0.0));

    for _ in 0..60 {
        sim.simulate(DT, Vec3::ZERO);
        let rotation = sim.body(&body).unwrap().world_transform().rotation;
        let (_, twist) = rotation.to_axis_angle();
        assert!(twist < 0.3 + 0.05, "twist {twist} escaped the limit");
    }
}

#[test]
fn batching_realigns_the_joint_table_without_breaking_handles() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let bodies: Vec<_> = (0..4)
        .map(|i| sim.create_dynamic_actor(&ball(), at(i as f32, 5.0)))
        .collect();

    let mut joints = Vec::new();
    for i in 0..3 {
        let desc = JointDesc::spherical(at(0.5, 0.0), at(-0.5, 0.0)).with_drive(
            D6Drive::Slerp,
            JointDrive::new(i as f32 + 1.0, 0.0),
        );
        let joint = sim.create_joint(&desc, &bodies[i], Some(&bodies[i + 1])).unwrap();
        joints.push(joint.unwrap());
    }

    sim.simulate(DT, Vec3::ZERO);
    assert_eq!(sim.last_step().joint_constraints, 3);
    assert_eq!(sim.last_step().joint_batches, 2);
    assert!(sim.last_step().joint_table_swaps > 0);

    for (i, joint) in joints.iter().enumerate() {
        let stiffness = sim.joint(joint).unwrap().drive(D6Drive::Slerp).stiffness;
        assert_abs_diff_eq!(stiffness, i as f32 + 1.0);
    }

    // The ordering is cached until something structural changes.
    sim.simulate(DT, Vec3::ZERO);
    assert_eq!(sim.last_step().joint_table_swaps, 0);
}

#[test]
fn unbatched_joints_each_get_a_batch() {
    let config = SimulationConfig::default().with_joint_batching(false);
    let mut sim = Simulation::new(config).unwrap();
    let a = sim.create_dynamic_actor(&ball(), at(0.0, 5.0));
    let b = sim.create_dynamic_actor(&ball(), at(1.0, 5.0));
    let c = sim.create_dynamic_actor(&ball(), at(5.0, 5.0));
    let d = sim.create_dynamic_actor(&ball(), at(6.0, 5.0));
    let desc = JointDesc::spherical(at(0.5, 0.0), at(-0.5, 0.0));
    sim.create_joint(&desc, &a, Some(&b)).unwrap();
    sim.create_joint(&desc, &c, Some(&d)).unwrap();

    sim.simulate(DT, GRAVITY);
    assert_eq!(sim.last_step().joint_batches, 2);
    assert_eq!(sim.last_step().joint_rows, 6);
}

#[test]
fn joints_touching_inactive_bodies_sit_out() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let a = sim.create_dynamic_actor(&ball(), at(0.0, 5.0));
    let b = sim.create_dynamic_actor(&ball(), at(1.0, 5.0));
    let desc = JointDesc::spherical(at(0.5, 0.0), at(-0.5, 0.0));
    sim.create_joint(&desc, &a, Some(&b)).unwrap().unwrap();

    sim.simulate(DT, Vec3::ZERO);
    assert_eq!(sim.last_step().joint_constraints, 1);

    sim.set_num_active_bodies(1);
    sim.simulate(DT, Vec3::ZERO);
    assert_eq!(sim.last_step().joint_constraints, 0);
    assert_eq!(sim.last_step().joint_rows, 0);
}

#[test]
fn ellipse_clamp_converges_for_points_outside_the_cone() {
    let radii_set = [
        Vec2::new(0.5, 0.3),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.2, 1.4),
        Vec2::new(1.2, 0.15),
    ];
    for radii in radii_set {
        for k in 0..32 {
            let angle = k as f32 * std::f32::consts::TAU / 32.0;
            for scale in [1.05, 1.5, 3.0, 10.0] {
                let point = Vec2::new(angle.cos() * radii.x, angle.sin() * radii.y) * scale;
                let clamp = clamp_to_ellipse(point, radii);
                let residual = (clamp.point.x / radii.x).powi(2) + (clamp.point.y / radii.y).powi(2) - 1.0;
                assert!(residual.abs() < 1e-3, "residual {residual} for {point:?} / {radii:?}");
                assert!(clamp.iterations <= 20);
                assert!(!clamp.inside);
                assert!(clamp.normal.dot(point - clamp.point) >= -1e-4);
            }
        }
    }
}
