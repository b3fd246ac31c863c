use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::backend::{MotionDelta, SolverBody};
use crate::core::soa::BodiesSoA;
use crate::utils::math::{angular_velocity_to_quat, world_inertia};

/// Builds one solver body per table row.
///
/// Active dynamic bodies receive gravity and their world-space inverse inertia.
/// Every other row is immovable; kinematic rows keep their velocity so contacts
/// see them moving.
pub fn build_solver_bodies(
    bodies: &BodiesSoA,
    dt: f32,
    gravity: Vec3,
    parallel: bool,
    out: &mut Vec<SolverBody>,
) {
    out.clear();
    let num_active = bodies.num_active_simulated();
    let kinematic_end = bodies.num_simulated() + bodies.num_kinematic();

    let build = |index: usize| -> SolverBody {
        let transform = bodies.transforms[index];
        let velocity = bodies.velocities[index];
        if index < num_active {
            let data = &bodies.data[index];
            SolverBody {
                transform,
                linear_velocity: velocity.linear + gravity * dt,
                angular_velocity: velocity.angular,
                inverse_mass: data.inverse_mass,
                inverse_inertia_world: world_inertia(transform.rotation, data.inverse_inertia),
                linear_damping: data.linear_damping,
                angular_damping: data.angular_damping,
                max_linear_velocity_squared: data.max_linear_velocity_squared,
                max_angular_velocity_squared: data.max_angular_velocity_squared,
                max_depenetration_velocity: data.max_depenetration_velocity,
                max_contact_impulse: data.max_contact_impulse,
            }
        } else {
            let mut body = SolverBody::fixed(transform);
            if index >= bodies.num_simulated() && index < kinematic_end {
                body.linear_velocity = velocity.linear;
                body.angular_velocity = velocity.angular;
            }
            body
        }
    };

    #[cfg(feature = "parallel")]
    if parallel {
        out.par_extend((0..bodies.len()).into_par_iter().map(build));
        return;
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    out.extend((0..bodies.len()).map(build));
}

/// Semi-implicit Euler step for one movable body.
///
/// The pose advances with the position-pass velocity; the stored velocity is
/// the velocity-pass result. Both are damped and clamped first.
pub fn integrate_body(body: &mut SolverBody, delta: &MotionDelta, dt: f32) {
    if !body.is_movable() {
        return;
    }

    let linear_scale = (1.0 - body.linear_damping * dt).max(0.0);
    let angular_scale = (1.0 - body.angular_damping * dt).max(0.0);
    let settle = |linear: Vec3, angular: Vec3| {
        (
            clamp_squared(linear * linear_scale, body.max_linear_velocity_squared),
            clamp_squared(angular * angular_scale, body.max_angular_velocity_squared),
        )
    };

    let (position_linear, position_angular) = settle(
        body.linear_velocity + delta.position_linear,
        body.angular_velocity + delta.position_angular,
    );
    let (linear, angular) = settle(
        body.linear_velocity + delta.linear,
        body.angular_velocity + delta.angular,
    );

    body.transform.position += position_linear * dt;
    body.transform.rotation =
        (angular_velocity_to_quat(position_angular, dt) * body.transform.rotation).normalize();
    body.linear_velocity = linear;
    body.angular_velocity = angular;
}

pub fn integrate_bodies(bodies: &mut [SolverBody], deltas: &[MotionDelta], dt: f32, parallel: bool) {
    #[cfg(feature = "parallel")]
    if parallel {
        bodies
            .par_iter_mut()
            .zip(deltas.par_iter())
            .for_each(|(body, delta)| integrate_body(body, delta, dt));
        return;
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    for (body, delta) in bodies.iter_mut().zip(deltas) {
        integrate_body(body, delta, dt);
    }
}

fn clamp_squared(velocity: Vec3, max_squared: f32) -> Vec3 {
    let length_squared = velocity.length_squared();
    if length_squared > max_squared && length_squared > 0.0 {
        velocity * (max_squared / length_squared).sqrt()
    } else {
        velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Transform;

    fn movable() -> SolverBody {
        SolverBody {
            inverse_mass: 1.0,
            inverse_inertia_world: glam::Mat3::IDENTITY,
            ..SolverBody::fixed(Transform::IDENTITY)
        }
    }

    #[test]
    fn velocity_clamp_preserves_direction() {
        let mut body = movable();
        body.linear_velocity = Vec3::new(30.0, 40.0, 0.0);
        body.max_linear_velocity_squared = 25.0;
        integrate_body(&mut body, &MotionDelta::default(), 0.1);
        assert!((body.linear_velocity - Vec3::new(3.0, 4.0, 0.0)).length() < 1e-4);
        assert!((body.transform.position - Vec3::new(0.3, 0.4, 0.0)).length() < 1e-4);
    }

    #[test]
    fn pose_uses_position_pass_velocity() {
        let mut body = movable();
        let delta = MotionDelta {
            linear: Vec3::ZERO,
            position_linear: Vec3::new(0.0, 0.0, 1.0),
            ..MotionDelta::default()
        };
        integrate_body(&mut body, &delta, 0.5);
        assert!((body.transform.position.z - 0.5).abs() < 1e-6);
        assert_eq!(body.linear_velocity, Vec3::ZERO);
    }

    #[test]
    fn fixed_bodies_do_not_move() {
        let mut body = SolverBody::fixed(Transform::IDENTITY);
        body.linear_velocity = Vec3::X;
        integrate_body(&mut body, &MotionDelta::default(), 1.0);
        assert_eq!(body.transform.position, Vec3::ZERO);
    }
}
