use super::types::{InertiaTensorExt, Material, Transform};
use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// Geometry understood by the built-in narrow phase.
///
/// Capsules are aligned along their local X axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    Capsule { radius: f32, half_height: f32 },
}

impl ColliderShape {
    pub fn bounding_radius(&self) -> f32 {
        match self {
            ColliderShape::Sphere { radius } => *radius,
            ColliderShape::Box { half_extents } => half_extents.length(),
            ColliderShape::Capsule {
                radius,
                half_height,
            } => radius + half_height,
        }
    }

    pub fn volume(&self) -> f32 {
        use std::f32::consts::PI;
        match self {
            ColliderShape::Sphere { radius } => 4.0 / 3.0 * PI * radius.powi(3),
            ColliderShape::Box { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
            ColliderShape::Capsule {
                radius,
                half_height,
            } => PI * radius * radius * (2.0 * half_height) + 4.0 / 3.0 * PI * radius.powi(3),
        }
    }

    /// Principal inertia about the shape's own origin.
    pub fn inertia(&self, mass: f32) -> Vec3 {
        match self {
            ColliderShape::Sphere { radius } => Vec3::for_solid_sphere(*radius, mass),
            ColliderShape::Box { half_extents } => Vec3::for_solid_box(*half_extents, mass),
            ColliderShape::Capsule {
                radius,
                half_height,
            } => Vec3::for_solid_capsule(*radius, *half_height, mass),
        }
    }
}

/// Caller-supplied description of one shape, posed in actor space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub shape: ColliderShape,
    pub offset: Transform,
    pub material: Material,
    /// Query-only shapes are skipped when the shape catalog is built.
    pub simulation: bool,
}

impl Default for Collider {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Collider {
    pub fn sphere(radius: f32) -> Collider {
        Self::builder().sphere(radius).build()
    }

    pub fn cuboid(half_extents: Vec3) -> Collider {
        Self::builder().box_shape(half_extents).build()
    }

    pub fn capsule(radius: f32, half_height: f32) -> Collider {
        Self::builder().capsule(radius, half_height).build()
    }

    pub fn builder() -> ColliderBuilder {
        ColliderBuilder::new()
    }
}

pub struct ColliderBuilder {
    shape: ColliderShape,
    offset: Transform,
    material: Material,
    simulation: bool,
}

impl Default for ColliderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ColliderBuilder {
    pub fn new() -> Self {
        Self {
            shape: ColliderShape::Sphere { radius: 0.5 },
            offset: Transform::IDENTITY,
            material: Material::default(),
            simulation: true,
        }
    }

    pub fn sphere(mut self, radius: f32) -> Self {
        self.shape = ColliderShape::Sphere { radius };
        self
    }

    pub fn box_shape(mut self, half_extents: Vec3) -> Self {
        self.shape = ColliderShape::Box { half_extents };
        self
    }

    pub fn capsule(mut self, radius: f32, half_height: f32) -> Self {
        self.shape = ColliderShape::Capsule {
            radius,
            half_height,
        };
        self
    }

    pub fn offset(mut self, offset: Transform) -> Self {
        self.offset = offset;
        self
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn query_only(mut self) -> Self {
        self.simulation = false;
        self
    }

    pub fn build(self) -> Collider {
        Collider {
            shape: self.shape,
            offset: self.offset,
            material: self.material,
            simulation: self.simulation,
        }
    }
}

/// Bounding sphere in body space used for broad-phase pruning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn overlaps(center_a: Vec3, radius_a: f32, center_b: Vec3, radius_b: f32) -> bool {
        let reach = radius_a + radius_b;
        center_a.distance_squared(center_b) <= reach * reach
    }
}

/// Shape catalog entry owned by a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    /// Pose relative to the body frame (not the actor frame).
    pub local_transform: Transform,
    pub bounds: BoundingSphere,
    pub material: Material,
    pub geometry: ColliderShape,
}

/// Records every simulation shape of `colliders`, re-expressed relative to the body frame.
pub fn build_shape_catalog(colliders: &[Collider], actor_to_body: &Transform) -> Vec<Shape> {
    let body_to_actor = actor_to_body.inverse();
    colliders
        .iter()
        .filter(|collider| collider.simulation)
        .map(|collider| {
            let local_transform = body_to_actor.combine(&collider.offset);
            Shape {
                local_transform,
                bounds: BoundingSphere {
                    center: local_transform.position,
                    radius: collider.shape.bounding_radius(),
                },
                material: collider.material,
                geometry: collider.shape,
            }
        })
        .collect()
}

/// Mass, centre of mass (actor space) and diagonal inertia about that centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeMassProperties {
    pub mass: f32,
    pub center_of_mass: Vec3,
    pub inertia: Vec3,
}

/// Integrates uniform-density mass properties over a set of colliders.
///
/// Off-diagonal products of inertia are dropped; the body frame keeps the actor orientation.
pub fn mass_properties_from_colliders(colliders: &[Collider], density: f32) -> ShapeMassProperties {
    let mut mass = 0.0;
    let mut weighted_center = Vec3::ZERO;
    for collider in colliders.iter().filter(|c| c.simulation) {
        let shape_mass = collider.shape.volume() * density;
        mass += shape_mass;
        weighted_center += collider.offset.position * shape_mass;
    }

    if mass <= f32::EPSILON {
        return ShapeMassProperties {
            mass: 0.0,
            center_of_mass: Vec3::ZERO,
            inertia: Vec3::ZERO,
        };
    }
    let center_of_mass = weighted_center / mass;

    let mut tensor = Mat3::ZERO;
    for collider in colliders.iter().filter(|c| c.simulation) {
        let shape_mass = collider.shape.volume() * density;
        let rotation = Mat3::from_quat(collider.offset.rotation);
        let local = Mat3::from_diagonal(collider.shape.inertia(shape_mass));
        let rotated = rotation * local * rotation.transpose();

        let r = collider.offset.position - center_of_mass;
        let parallel_axis =
            (Mat3::IDENTITY * r.length_squared() - outer_product(r, r)) * shape_mass;
        tensor += rotated + parallel_axis;
    }

    ShapeMassProperties {
        mass,
        center_of_mass,
        inertia: Vec3::new(tensor.x_axis.x, tensor.y_axis.y, tensor.z_axis.z),
    }
}

fn outer_product(a: Vec3, b: Vec3) -> Mat3 {
    Mat3::from_cols(a * b.x, a * b.y, a * b.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn catalog_is_expressed_in_body_frame() {
        let colliders = [Collider::builder()
            .sphere(0.25)
            .offset(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)))
            .build()];
        let actor_to_body = Transform::from_position(Vec3::new(0.5, 0.0, 0.0));

        let shapes = build_shape_catalog(&colliders, &actor_to_body);
        assert_eq!(shapes.len(), 1);
        assert!(shapes[0]
            .local_transform
            .position
            .abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
        assert!((shapes[0].bounds.radius - 0.25).abs() < 1e-6);
    }

    #[test]
    fn query_only_shapes_are_not_cataloged() {
        let colliders = [
            Collider::sphere(1.0),
            Collider::builder().sphere(2.0).query_only().build(),
        ];
        let shapes = build_shape_catalog(&colliders, &Transform::IDENTITY);
        assert_eq!(shapes.len(), 1);
    }

    #[test]
    fn rotated_capsule_bounds_cover_caps() {
        let collider = Collider::builder()
            .capsule(0.1, 0.4)
            .offset(Transform::from_rotation(Quat::from_rotation_z(1.0)))
            .build();
        assert!((collider.shape.bounding_radius() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mass_properties_center_between_equal_spheres() {
        let colliders = [
            Collider::builder()
                .sphere(0.5)
                .offset(Transform::from_position(Vec3::new(-1.0, 0.0, 0.0)))
                .build(),
            Collider::builder()
                .sphere(0.5)
                .offset(Transform::from_position(Vec3::new(3.0, 0.0, 0.0)))
                .build(),
        ];
        let props = mass_properties_from_colliders(&colliders, 1000.0);
        assert!(props.center_of_mass.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-4));
        // Spheres sit on the X axis, so the X moment is the smallest.
        assert!(props.inertia.x < props.inertia.y);
        assert!((props.inertia.y - props.inertia.z).abs() < 1e-2);
    }
}
