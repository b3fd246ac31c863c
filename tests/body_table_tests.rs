use approx::assert_abs_diff_eq;
use ragdoll_accelerator::*;

fn sphere(mass: f32) -> BodyDesc {
    BodyDesc::new(vec![Collider::sphere(0.5)]).with_mass(mass, Vec3::splat(0.1 * mass))
}

fn assert_partitioned(sim: &Simulation) {
    let table = sim.body_table();
    let dynamic = table.num_simulated();
    let kinematic = table.num_kinematic();
    for (i, kind) in table.kinds.iter().enumerate() {
        let expected = if i < dynamic {
            BodyKind::Dynamic
        } else if i < dynamic + kinematic {
            BodyKind::Kinematic
        } else {
            BodyKind::Static
        };
        assert_eq!(*kind, expected, "row {i} out of partition");
    }
}

#[test]
fn partition_holds_for_any_creation_order() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let ground = [Collider::cuboid(Vec3::splat(1.0))];

    sim.create_static_actor(&ground, Transform::IDENTITY);
    assert_partitioned(&sim);
    sim.create_kinematic_actor(&sphere(1.0), Transform::IDENTITY);
    assert_partitioned(&sim);
    sim.create_dynamic_actor(&sphere(1.0), Transform::IDENTITY);
    assert_partitioned(&sim);
    sim.create_static_actor(&ground, Transform::IDENTITY);
    sim.create_dynamic_actor(&sphere(1.0), Transform::IDENTITY);
    assert_partitioned(&sim);
    sim.create_kinematic_actor(&sphere(1.0), Transform::IDENTITY);
    sim.create_dynamic_actor(&sphere(1.0), Transform::IDENTITY);
    assert_partitioned(&sim);

    assert_eq!(sim.num_dynamic_bodies(), 3);
    assert_eq!(sim.num_kinematic_bodies(), 2);
    assert_eq!(sim.num_static_bodies(), 2);
    assert_eq!(sim.num_active_bodies(), 3);
}

#[test]
fn handles_follow_their_rows_through_reordering() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let wall = sim.create_static_actor(
        &[Collider::cuboid(Vec3::ONE)],
        Transform::from_position(Vec3::new(7.0, 0.0, 0.0)),
    );
    let platform = sim.create_kinematic_actor(&sphere(1.0), Transform::from_position(Vec3::new(3.0, 0.0, 0.0)));
    let ball = sim.create_dynamic_actor(&sphere(1.0), Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));

    let wall_ref = sim.body(&wall).unwrap();
    assert_eq!(wall_ref.kind(), BodyKind::Static);
    assert_abs_diff_eq!(wall_ref.world_transform().position.x, 7.0);

    let platform_ref = sim.body(&platform).unwrap();
    assert_eq!(platform_ref.kind(), BodyKind::Kinematic);
    assert_abs_diff_eq!(platform_ref.world_transform().position.x, 3.0);

    let ball_ref = sim.body(&ball).unwrap();
    assert_eq!(ball_ref.index(), 0);
    assert!(ball_ref.is_simulated());
    assert_abs_diff_eq!(ball_ref.world_transform().position.x, 1.0);
}

#[test]
fn world_transform_round_trips_through_the_body_frame() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let desc = BodyDesc::from_colliders(
        vec![Collider::builder()
            .sphere(0.25)
            .offset(Transform::from_position(Vec3::new(0.0, 0.4, 0.0)))
            .build()],
        1000.0,
    );
    let handle = sim.create_dynamic_actor(&desc, Transform::IDENTITY);

    let target = Transform::new(Vec3::new(1.0, -2.0, 3.0), Quat::from_rotation_z(0.7));
    let mut body = sim.body_mut(&handle).unwrap();
    body.set_world_transform(target);
    let read_back = body.world_transform();

    assert!(read_back.abs_diff_eq(&target, 1e-5), "{read_back:?} != {target:?}");
    // The body frame sits at the collider's centre of mass.
    let body_origin = sim.body(&handle).unwrap().body_transform().position;
    let expected = target.transform_point(Vec3::new(0.0, 0.4, 0.0));
    assert_abs_diff_eq!(body_origin.x, expected.x, epsilon = 1e-5);
    assert_abs_diff_eq!(body_origin.y, expected.y, epsilon = 1e-5);
}

#[test]
fn force_kinds_route_to_the_right_buffer() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let handle = sim.create_dynamic_actor(&sphere(2.0), Transform::IDENTITY);
    let mut body = sim.body_mut(&handle).unwrap();

    body.add_force(Vec3::new(4.0, 0.0, 0.0), ForceKind::Force);
    body.add_force(Vec3::new(0.0, 1.0, 0.0), ForceKind::Acceleration);
    assert_eq!(body.view().pending_acceleration(), Vec3::new(2.0, 1.0, 0.0));
    assert_eq!(body.linear_velocity(), Vec3::ZERO);

    body.add_force(Vec3::new(0.0, 0.0, 6.0), ForceKind::Impulse);
    body.add_force(Vec3::new(1.0, 0.0, 0.0), ForceKind::VelocityChange);
    assert_eq!(body.linear_velocity(), Vec3::new(1.0, 0.0, 3.0));
}

#[test]
fn pending_acceleration_is_consumed_by_the_next_step() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let handle = sim.create_dynamic_actor(&sphere(1.0), Transform::IDENTITY);
    sim.body_mut(&handle)
        .unwrap()
        .add_force(Vec3::new(60.0, 0.0, 0.0), ForceKind::Acceleration);

    sim.simulate(1.0 / 60.0, Vec3::ZERO);
    let body = sim.body(&handle).unwrap();
    assert_abs_diff_eq!(body.linear_velocity().x, 1.0, epsilon = 1e-4);
    assert_eq!(body.pending_acceleration(), Vec3::ZERO);

    sim.simulate(1.0 / 60.0, Vec3::ZERO);
    assert_abs_diff_eq!(sim.body(&handle).unwrap().linear_velocity().x, 1.0, epsilon = 1e-4);
}

#[test]
fn radial_force_falls_off_linearly_and_stops_at_radius() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let near = sim.create_dynamic_actor(&sphere(1.0), Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));
    let far = sim.create_dynamic_actor(&sphere(1.0), Transform::from_position(Vec3::new(5.0, 0.0, 0.0)));

    for handle in [&near, &far] {
        sim.body_mut(handle).unwrap().add_radial_force(
            Vec3::ZERO,
            10.0,
            4.0,
            RadialFalloff::Linear,
            ForceKind::VelocityChange,
        );
    }

    assert_abs_diff_eq!(sim.body(&near).unwrap().linear_velocity().x, 7.5, epsilon = 1e-5);
    assert_eq!(sim.body(&far).unwrap().linear_velocity(), Vec3::ZERO);
}

#[test]
fn forces_on_static_bodies_are_ignored() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let wall = sim.create_static_actor(&[Collider::cuboid(Vec3::ONE)], Transform::IDENTITY);
    sim.body_mut(&wall)
        .unwrap()
        .add_force(Vec3::X, ForceKind::VelocityChange);
    assert_eq!(sim.body(&wall).unwrap().linear_velocity(), Vec3::ZERO);
}

#[test]
fn active_body_count_is_clamped_to_dynamic_partition() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    sim.create_dynamic_actor(&sphere(1.0), Transform::IDENTITY);
    sim.create_dynamic_actor(&sphere(1.0), Transform::IDENTITY);
    sim.create_static_actor(&[Collider::sphere(1.0)], Transform::IDENTITY);

    assert_eq!(sim.set_num_active_bodies(10), 2);
    assert_eq!(sim.set_num_active_bodies(1), 1);
    assert_eq!(sim.num_active_bodies(), 1);

    // A new dynamic body re-activates the whole dynamic partition.
    sim.create_dynamic_actor(&sphere(1.0), Transform::IDENTITY);
    assert_eq!(sim.num_active_bodies(), 3);
}

#[test]
fn accessors_cover_clamps_and_mass() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let handle = sim.create_dynamic_actor(&sphere(4.0), Transform::IDENTITY);
    let mut body = sim.body_mut(&handle).unwrap();

    assert_abs_diff_eq!(body.inverse_mass(), 0.25);
    body.set_inverse_mass(0.5);
    body.set_linear_damping(0.3);
    body.set_max_linear_velocity_squared(4.0);
    body.set_max_depenetration_velocity(2.0);
    body.set_max_contact_impulse(100.0);

    let view = sim.body(&handle).unwrap();
    assert_abs_diff_eq!(view.inverse_mass(), 0.5);
    assert_abs_diff_eq!(view.linear_damping(), 0.3);
    assert_abs_diff_eq!(view.max_linear_velocity_squared(), 4.0);
    assert_abs_diff_eq!(view.max_depenetration_velocity(), 2.0);
    assert_abs_diff_eq!(view.max_contact_impulse(), 100.0);
}
