//! Core types: transforms, materials, shapes, body and joint descriptors, and the tables.

pub mod types;
pub mod rigidbody;
pub mod collider;
pub mod constraints;
pub mod soa;

pub use types::{CombineMode, Material, MaterialPairProperties, Transform, Velocity};
pub use rigidbody::{BodyDesc, BodyKind, RigidBodyData};
pub use collider::{BoundingSphere, Collider, ColliderBuilder, ColliderShape, Shape};
pub use constraints::{
    AngularLimitPair, ConeLimit, D6Axis, D6Drive, D6Motion, JointData, JointDesc, JointDrive,
    LimitSpring, LinearLimit,
};
pub use soa::{BodiesSoA, BodyMut, BodyRef, JointsSoA, KinematicTarget};
