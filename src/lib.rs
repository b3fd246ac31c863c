//! Ragdoll Accelerator – an immediate-mode rigid-body solver.
//!
//! A [`Simulation`] advances dynamic, kinematic and static bodies joined by
//! six-axis joints by one step per [`Simulation::simulate`] call. Bodies and
//! joints are reached through opaque handles that stay valid while the
//! underlying tables are reordered.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod simulation;
pub mod utils;

pub use glam::{Mat3, Quat, Vec2, Vec3};

pub use config::SimulationConfig;
pub use crate::core::{
    collider::{Collider, ColliderShape},
    constraints::{
        AngularLimitPair, ConeLimit, D6Axis, D6Drive, D6Motion, JointDesc, JointDrive,
        LimitSpring, LinearLimit,
    },
    rigidbody::{BodyDesc, BodyKind},
    soa::{BodyMut, BodyRef},
    types::{CombineMode, Material, Transform, Velocity},
};
pub use dynamics::{
    backend::SolverBackend,
    forces::{ForceKind, RadialFalloff},
    solver::PgsBackend,
};
pub use error::PhysicsError;
pub use simulation::{PhaseTimings, Simulation, StepStats};
pub use utils::allocator::{BodyHandle, JointHandle};
