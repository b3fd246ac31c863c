use std::collections::HashSet;

use approx::assert_abs_diff_eq;
use ragdoll_accelerator::*;

const DT: f32 = 1.0 / 60.0;

fn ball() -> BodyDesc {
    BodyDesc::from_colliders(vec![Collider::sphere(0.5)], 1000.0)
}

fn at(x: f32) -> Transform {
    Transform::from_position(Vec3::new(x, 0.0, 0.0))
}

#[test]
fn each_overlapping_shape_pair_is_reported_once() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    for x in [0.0, 0.4, 0.8] {
        sim.create_dynamic_actor(&ball(), at(x));
    }
    sim.simulate(DT, Vec3::ZERO);

    let pairs = sim.contact_pairs();
    assert_eq!(pairs.len(), 3);
    let mut seen = HashSet::new();
    for pair in pairs {
        assert!(pair.shape_a < pair.shape_b);
        assert!(seen.insert((pair.shape_a, pair.shape_b)));
        assert!(!seen.contains(&(pair.shape_b, pair.shape_a)));
    }
}

#[test]
fn ignored_pairs_are_skipped_but_others_remain() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let a = sim.create_dynamic_actor(&ball(), at(0.0));
    let b = sim.create_dynamic_actor(&ball(), at(0.4));
    sim.create_dynamic_actor(&ball(), at(0.8));

    sim.set_ignore_collision_pair_table(&[(&b, &a)]).unwrap();
    sim.simulate(DT, Vec3::ZERO);

    let row_a = sim.body(&a).unwrap().index();
    let row_b = sim.body(&b).unwrap().index();
    let pairs = sim.contact_pairs();
    assert_eq!(pairs.len(), 2);
    for pair in pairs {
        let rows = [pair.body_a, pair.body_b];
        assert!(!(rows.contains(&row_a) && rows.contains(&row_b)));
    }
    assert_eq!(sim.contact_cache().skip_count(), 1);
}

#[test]
fn ignored_actor_shapes_leave_the_catalog() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let a = sim.create_dynamic_actor(&ball(), at(0.0));
    sim.create_dynamic_actor(&ball(), at(0.4));
    sim.create_static_actor(&[Collider::sphere(0.5)], at(-0.4));

    sim.set_ignore_collision_actors(&[&a]).unwrap();
    sim.simulate(DT, Vec3::ZERO);

    assert_eq!(sim.contact_cache().shape_count(), 2);
    let row_a = sim.body(&a).unwrap().index();
    assert!(sim
        .contact_pairs()
        .iter()
        .all(|pair| pair.body_a != row_a && pair.body_b != row_a));
}

#[test]
fn shapes_of_one_body_never_collide_with_each_other() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let compound = BodyDesc::from_colliders(
        vec![
            Collider::builder().sphere(0.5).offset(at(-0.2)).build(),
            Collider::builder().sphere(0.5).offset(at(0.2)).build(),
        ],
        1000.0,
    );
    sim.create_dynamic_actor(&compound, Transform::IDENTITY);
    sim.simulate(DT, Vec3::ZERO);

    assert_eq!(sim.contact_cache().shape_count(), 2);
    assert_eq!(sim.contact_cache().skip_count(), 1);
    assert_eq!(sim.last_step().contact_pairs, 0);
}

#[test]
fn fixed_bodies_are_not_tested_against_each_other() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    sim.create_static_actor(&[Collider::sphere(0.5)], at(0.0));
    sim.create_static_actor(&[Collider::sphere(0.5)], at(0.2));
    sim.create_kinematic_actor(&ball(), at(0.4));
    sim.simulate(DT, Vec3::ZERO);
    assert_eq!(sim.last_step().contact_pairs, 0);
}

#[test]
fn query_only_colliders_are_not_catalogued() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let sensor = BodyDesc::new(vec![Collider::builder().sphere(0.5).query_only().build()]);
    sim.create_dynamic_actor(&sensor, at(0.0));
    sim.create_dynamic_actor(&ball(), at(0.3));
    sim.simulate(DT, Vec3::ZERO);

    assert_eq!(sim.contact_cache().shape_count(), 1);
    assert_eq!(sim.last_step().contact_pairs, 0);
}

#[test]
fn restitution_uses_its_own_combine_mode() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let first = Material {
        static_friction: 0.4,
        dynamic_friction: 0.4,
        restitution: 0.2,
        friction_combine: CombineMode::Multiply,
        restitution_combine: CombineMode::Max,
    };
    let second = Material {
        static_friction: 0.5,
        dynamic_friction: 0.5,
        restitution: 0.6,
        ..Material::default()
    };
    for (material, x) in [(first, 0.0), (second, 0.9)] {
        let desc = BodyDesc::from_colliders(
            vec![Collider::builder().sphere(0.5).material(material).build()],
            1000.0,
        );
        sim.create_dynamic_actor(&desc, at(x));
    }
    sim.simulate(DT, Vec3::ZERO);

    let pair = &sim.contact_pairs()[0];
    assert_abs_diff_eq!(pair.material.static_friction, 0.2, epsilon = 1e-6);
    assert_abs_diff_eq!(pair.material.dynamic_friction, 0.2, epsilon = 1e-6);
    assert_abs_diff_eq!(pair.material.restitution, 0.6, epsilon = 1e-6);
}

#[test]
fn contact_normals_point_from_a_to_b() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    sim.create_dynamic_actor(&ball(), at(0.0));
    sim.create_dynamic_actor(&ball(), at(0.9));
    sim.simulate(DT, Vec3::ZERO);

    let contacts = sim.contacts();
    let pair = &contacts.pairs[0];
    let table = sim.body_table();
    let from_a_to_b = table.transforms[pair.body_b].position - table.transforms[pair.body_a].position;
    for point in contacts.points_of(pair) {
        assert!(point.normal.dot(from_a_to_b) > 0.0);
        assert!(point.separation < 0.0);
    }
}

#[test]
fn overlapping_spheres_are_pushed_apart() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let a = sim.create_dynamic_actor(&ball(), at(0.0));
    let b = sim.create_dynamic_actor(&ball(), at(0.8));
    for _ in 0..60 {
        sim.simulate(DT, Vec3::ZERO);
    }
    let gap = sim.body(&b).unwrap().world_transform().position.x - sim.body(&a).unwrap().world_transform().position.x;
    assert!(gap > 0.97, "spheres still overlap: gap {gap}");
}
