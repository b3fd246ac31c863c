use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Common math types re-exported for convenience.
pub use glam::{Mat3, Vec2};

/// Rigid position and orientation of an actor, body or shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Applies `other` in the local frame of `self` (`self ∘ other`).
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * other.position,
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.conjugate();
        Transform {
            position: rotation * -self.position,
            rotation,
        }
    }

    /// Expresses `other` in the local frame of `self` (`self⁻¹ ∘ other`).
    pub fn inverse_combine(&self, other: &Transform) -> Transform {
        let inv = self.rotation.conjugate();
        Transform {
            position: inv * (other.position - self.position),
            rotation: (inv * other.rotation).normalize(),
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }

    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.conjugate() * (point - self.position)
    }

    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Component-wise comparison that treats `q` and `-q` as the same rotation.
    pub fn abs_diff_eq(&self, other: &Transform, epsilon: f32) -> bool {
        let rotation_match = self.rotation.abs_diff_eq(other.rotation, epsilon)
            || self.rotation.abs_diff_eq(-other.rotation, epsilon);
        self.position.abs_diff_eq(other.position, epsilon) && rotation_match
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

/// How two materials mix one of their coefficients.
///
/// When the two sides disagree, the mode with the larger discriminant wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum CombineMode {
    #[default]
    Average = 0,
    Min = 1,
    Multiply = 2,
    Max = 3,
}

impl CombineMode {
    pub fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            CombineMode::Average => 0.5 * (a + b),
            CombineMode::Min => a.min(b),
            CombineMode::Multiply => a * b,
            CombineMode::Max => a.max(b),
        }
    }

    pub fn resolve(self, other: CombineMode) -> CombineMode {
        self.max(other)
    }
}

/// Surface coefficients captured per shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub restitution: f32,
    pub friction_combine: CombineMode,
    pub restitution_combine: CombineMode,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            static_friction: 0.7,
            dynamic_friction: 0.7,
            restitution: 0.3,
            friction_combine: CombineMode::Average,
            restitution_combine: CombineMode::Average,
        }
    }
}

impl Material {
    pub fn rubber() -> Self {
        Self {
            static_friction: 1.2,
            dynamic_friction: 1.0,
            restitution: 0.8,
            ..Self::default()
        }
    }

    pub fn ice() -> Self {
        Self {
            static_friction: 0.05,
            dynamic_friction: 0.03,
            restitution: 0.05,
            ..Self::default()
        }
    }

    pub fn with_friction_combine(mut self, mode: CombineMode) -> Self {
        self.friction_combine = mode;
        self
    }

    pub fn with_restitution_combine(mut self, mode: CombineMode) -> Self {
        self.restitution_combine = mode;
        self
    }

    /// Mixes two materials. Friction and restitution each use their own mode.
    pub fn combine_with(&self, other: &Self) -> MaterialPairProperties {
        let friction_mode = self.friction_combine.resolve(other.friction_combine);
        let restitution_mode = self.restitution_combine.resolve(other.restitution_combine);

        MaterialPairProperties {
            static_friction: friction_mode.combine(self.static_friction, other.static_friction),
            dynamic_friction: friction_mode
                .combine(self.dynamic_friction, other.dynamic_friction),
            restitution: restitution_mode.combine(self.restitution, other.restitution),
        }
    }
}

/// Coefficients of a shape pair after combining both materials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialPairProperties {
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub restitution: f32,
}

impl Default for MaterialPairProperties {
    fn default() -> Self {
        Material::default().combine_with(&Material::default())
    }
}

/// Helper methods for diagonal inertia calculations.
pub trait InertiaTensorExt {
    fn for_solid_box(half_extents: Vec3, mass: f32) -> Self;
    fn for_solid_sphere(radius: f32, mass: f32) -> Self;
    fn for_solid_capsule(radius: f32, half_height: f32, mass: f32) -> Self;
}

impl InertiaTensorExt for Vec3 {
    fn for_solid_box(half_extents: Vec3, mass: f32) -> Vec3 {
        let lx = half_extents.x * 2.0;
        let ly = half_extents.y * 2.0;
        let lz = half_extents.z * 2.0;
        let factor = mass / 12.0;
        Vec3::new(
            factor * (ly * ly + lz * lz),
            factor * (lx * lx + lz * lz),
            factor * (lx * lx + ly * ly),
        )
    }

    fn for_solid_sphere(radius: f32, mass: f32) -> Vec3 {
        Vec3::splat(0.4 * mass * radius * radius)
    }

    /// Capsule aligned along local X, matching the capsule geometry convention.
    fn for_solid_capsule(radius: f32, half_height: f32, mass: f32) -> Vec3 {
        let height = half_height * 2.0;
        let cylinder_volume = std::f32::consts::PI * radius * radius * height;
        let sphere_volume = 4.0 / 3.0 * std::f32::consts::PI * radius.powi(3);
        let total = cylinder_volume + sphere_volume;
        if total <= f32::EPSILON {
            return Vec3::ZERO;
        }
        let cylinder_mass = mass * cylinder_volume / total;
        let sphere_mass = mass - cylinder_mass;

        let axial = 0.5 * cylinder_mass * radius * radius + 0.4 * sphere_mass * radius * radius;
        let cap_offset = half_height + 3.0 / 8.0 * radius;
        let transverse = cylinder_mass * (3.0 * radius * radius + height * height) / 12.0
            + sphere_mass * (0.4 * radius * radius + cap_offset * cap_offset);
        Vec3::new(axial, transverse, transverse)
    }
}
