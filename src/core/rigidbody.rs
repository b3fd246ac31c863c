use super::collider::{mass_properties_from_colliders, Collider};
use super::types::Transform;
use crate::config::{
    DEFAULT_ANGULAR_DAMPING, DEFAULT_LINEAR_DAMPING, DEFAULT_MAX_ANGULAR_VELOCITY,
    DEFAULT_MAX_CONTACT_IMPULSE, DEFAULT_MAX_DEPENETRATION_VELOCITY,
    DEFAULT_MAX_LINEAR_VELOCITY, DEFAULT_POSITION_ITERATIONS, DEFAULT_VELOCITY_ITERATIONS,
};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Which partition of the body table a body lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BodyKind {
    Dynamic,
    Kinematic,
    Static,
}

/// Caller-supplied description of a kinematic or dynamic body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDesc {
    pub colliders: Vec<Collider>,
    pub mass: f32,
    /// Principal moments of inertia in the body frame.
    pub inertia: Vec3,
    /// Pose of the body frame (centre of mass, principal axes) in actor space.
    pub center_of_mass: Transform,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub max_linear_velocity: f32,
    pub max_angular_velocity: f32,
    pub max_depenetration_velocity: f32,
    pub max_contact_impulse: f32,
    pub position_iterations: u32,
    pub velocity_iterations: u32,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            colliders: Vec::new(),
            mass: 1.0,
            inertia: Vec3::ONE,
            center_of_mass: Transform::IDENTITY,
            linear_damping: DEFAULT_LINEAR_DAMPING,
            angular_damping: DEFAULT_ANGULAR_DAMPING,
            max_linear_velocity: DEFAULT_MAX_LINEAR_VELOCITY,
            max_angular_velocity: DEFAULT_MAX_ANGULAR_VELOCITY,
            max_depenetration_velocity: DEFAULT_MAX_DEPENETRATION_VELOCITY,
            max_contact_impulse: DEFAULT_MAX_CONTACT_IMPULSE,
            position_iterations: DEFAULT_POSITION_ITERATIONS,
            velocity_iterations: DEFAULT_VELOCITY_ITERATIONS,
        }
    }
}

impl BodyDesc {
    pub fn new(colliders: Vec<Collider>) -> Self {
        Self {
            colliders,
            ..Self::default()
        }
    }

    /// Derives mass, centre of mass and inertia from the colliders at a uniform density.
    pub fn from_colliders(colliders: Vec<Collider>, density: f32) -> Self {
        let props = mass_properties_from_colliders(&colliders, density);
        Self {
            mass: props.mass,
            inertia: props.inertia,
            center_of_mass: Transform::from_position(props.center_of_mass),
            ..Self::new(colliders)
        }
    }

    pub fn with_mass(mut self, mass: f32, inertia: Vec3) -> Self {
        self.mass = mass;
        self.inertia = inertia;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_iterations(mut self, position: u32, velocity: u32) -> Self {
        self.position_iterations = position;
        self.velocity_iterations = velocity;
        self
    }
}

/// Body-space dynamics row stored in the body table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyData {
    pub inverse_mass: f32,
    pub inverse_inertia: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub max_linear_velocity_squared: f32,
    pub max_angular_velocity_squared: f32,
    pub max_depenetration_velocity: f32,
    pub max_contact_impulse: f32,
}

impl RigidBodyData {
    pub fn from_desc(desc: &BodyDesc) -> Self {
        Self {
            inverse_mass: invert(desc.mass),
            inverse_inertia: Vec3::new(
                invert(desc.inertia.x),
                invert(desc.inertia.y),
                invert(desc.inertia.z),
            ),
            linear_damping: desc.linear_damping,
            angular_damping: desc.angular_damping,
            max_linear_velocity_squared: desc.max_linear_velocity * desc.max_linear_velocity,
            max_angular_velocity_squared: desc.max_angular_velocity * desc.max_angular_velocity,
            max_depenetration_velocity: desc.max_depenetration_velocity,
            max_contact_impulse: desc.max_contact_impulse,
        }
    }

    /// Data for bodies that never respond to forces.
    pub fn fixed() -> Self {
        Self {
            inverse_mass: 0.0,
            inverse_inertia: Vec3::ZERO,
            linear_damping: 0.0,
            angular_damping: 0.0,
            max_linear_velocity_squared: f32::MAX,
            max_angular_velocity_squared: f32::MAX,
            max_depenetration_velocity: DEFAULT_MAX_DEPENETRATION_VELOCITY,
            max_contact_impulse: DEFAULT_MAX_CONTACT_IMPULSE,
        }
    }
}

fn invert(value: f32) -> f32 {
    if value.abs() < f32::EPSILON {
        0.0
    } else {
        1.0 / value
    }
}
