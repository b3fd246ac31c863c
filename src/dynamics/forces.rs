use glam::Vec3;
use serde::{Deserialize, Serialize};

/// How a force-like value is applied to a dynamic body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceKind {
    /// `value · invMass` accumulated into the pending acceleration, consumed next step.
    Force,
    /// `value` accumulated into the pending acceleration, mass ignored.
    Acceleration,
    /// `value · invMass` added to the linear velocity immediately.
    Impulse,
    /// `value` added to the linear velocity immediately, mass ignored.
    VelocityChange,
}

/// Strength profile of a radial force over its radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadialFalloff {
    Constant,
    Linear,
}

/// Routes `value` into either the pending-acceleration buffer or the velocity.
pub fn accumulate(
    kind: ForceKind,
    value: Vec3,
    inverse_mass: f32,
    pending_acceleration: &mut Vec3,
    linear_velocity: &mut Vec3,
) {
    match kind {
        ForceKind::Force => *pending_acceleration += value * inverse_mass,
        ForceKind::Acceleration => *pending_acceleration += value,
        ForceKind::Impulse => *linear_velocity += value * inverse_mass,
        ForceKind::VelocityChange => *linear_velocity += value,
    }
}

/// Force vector felt at `position` from a radial source, or `None` outside `radius`.
pub fn radial_force(
    position: Vec3,
    origin: Vec3,
    strength: f32,
    radius: f32,
    falloff: RadialFalloff,
) -> Option<Vec3> {
    let delta = position - origin;
    let distance = delta.length();
    if distance > radius {
        return None;
    }
    let direction = delta.normalize_or_zero();
    let scale = match falloff {
        RadialFalloff::Constant => 1.0,
        RadialFalloff::Linear => {
            if radius > 0.0 {
                1.0 - distance / radius
            } else {
                0.0
            }
        }
    };
    Some(direction * strength * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_kinds_route_to_the_right_buffer() {
        let mut pending = Vec3::ZERO;
        let mut velocity = Vec3::ZERO;
        let value = Vec3::new(2.0, 0.0, 0.0);

        accumulate(ForceKind::Force, value, 0.5, &mut pending, &mut velocity);
        assert_eq!(pending, Vec3::new(1.0, 0.0, 0.0));
        accumulate(ForceKind::Acceleration, value, 0.5, &mut pending, &mut velocity);
        assert_eq!(pending, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(velocity, Vec3::ZERO);

        accumulate(ForceKind::Impulse, value, 0.5, &mut pending, &mut velocity);
        assert_eq!(velocity, Vec3::new(1.0, 0.0, 0.0));
        accumulate(ForceKind::VelocityChange, value, 0.5, &mut pending, &mut velocity);
        assert_eq!(velocity, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn linear_falloff_scales_with_distance() {
        let force = radial_force(
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::ZERO,
            10.0,
            2.0,
            RadialFalloff::Linear,
        )
        .unwrap();
        assert!((force.x - 7.5).abs() < 1e-5);

        let constant = radial_force(
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::ZERO,
            10.0,
            2.0,
            RadialFalloff::Constant,
        )
        .unwrap();
        assert!((constant.x - 10.0).abs() < 1e-5);
    }

    #[test]
    fn nothing_beyond_radius() {
        assert!(radial_force(
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::ZERO,
            10.0,
            2.0,
            RadialFalloff::Constant
        )
        .is_none());
    }
}
