//! Simulation dynamics: joint row derivation, batching, the solver backend and integration.

pub mod backend;
pub mod batcher;
pub mod d6;
pub mod ellipse;
pub mod forces;
pub mod friction;
pub mod integrator;
pub mod solver;

pub use backend::{
    ConstraintBatch, ConstraintDescriptor, ConstraintRow, ConstraintSource, MotionDelta, RowKind,
    SolveIterations, SolverBackend, SolverBody,
};
pub use ellipse::{clamp_to_ellipse, EllipseClamp};
pub use forces::{ForceKind, RadialFalloff};
pub use solver::PgsBackend;
