//! The low-level solver library seen by the simulation loop.
//!
//! The step orchestrates; a [`SolverBackend`] does contact generation, solver
//! body construction, batching, constraint preparation, solving and
//! integration. [`PgsBackend`](crate::dynamics::solver::PgsBackend) is the
//! built-in implementation.

use std::ops::Range;

use glam::{Mat3, Vec3};

use crate::collision::contact::{ContactPair, ContactPoint, PairCache};
use crate::core::collider::ColliderShape;
use crate::core::soa::BodiesSoA;
use crate::core::types::Transform;

/// Per-step working copy of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverBody {
    /// Body-frame pose.
    pub transform: Transform,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Zero for anything the solver must not move.
    pub inverse_mass: f32,
    pub inverse_inertia_world: Mat3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub max_linear_velocity_squared: f32,
    pub max_angular_velocity_squared: f32,
    pub max_depenetration_velocity: f32,
    pub max_contact_impulse: f32,
}

impl SolverBody {
    pub fn fixed(transform: Transform) -> Self {
        Self {
            transform,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            inverse_mass: 0.0,
            inverse_inertia_world: Mat3::ZERO,
            linear_damping: 0.0,
            angular_damping: 0.0,
            max_linear_velocity_squared: f32::MAX,
            max_angular_velocity_squared: f32::MAX,
            max_depenetration_velocity: f32::MAX,
            max_contact_impulse: f32::MAX,
        }
    }

    pub fn is_movable(&self) -> bool {
        self.inverse_mass > 0.0
    }
}

/// Velocity change produced by the solver for one body.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionDelta {
    /// Change to apply to the stored velocity.
    pub linear: Vec3,
    pub angular: Vec3,
    /// Change used to advance the pose (includes position-correction bias).
    pub position_linear: Vec3,
    pub position_angular: Vec3,
}

/// One scalar constraint, expressed for bodies A and B.
///
/// `Ċ = linear·(v_B − v_A) + angular_b·ω_B − angular_a·ω_A`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintRow {
    pub linear: Vec3,
    pub angular_a: Vec3,
    pub angular_b: Vec3,
    /// Current position error. Equality rows drive it to zero, inequality rows keep it non-negative.
    pub geometric_error: f32,
    pub velocity_target: f32,
    pub kind: RowKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowKind {
    Equality,
    Inequality,
    Spring {
        stiffness: f32,
        damping: f32,
        acceleration: bool,
        min_impulse: f32,
        max_impulse: f32,
    },
}

impl ConstraintRow {
    pub fn angular(axis: Vec3, geometric_error: f32, kind: RowKind) -> Self {
        Self {
            linear: Vec3::ZERO,
            angular_a: axis,
            angular_b: axis,
            geometric_error,
            velocity_target: 0.0,
            kind,
        }
    }

    /// Linear row along `axis` acting at lever arms `ra` and `rb`.
    pub fn linear(axis: Vec3, ra: Vec3, rb: Vec3, geometric_error: f32, kind: RowKind) -> Self {
        Self {
            linear: axis,
            angular_a: ra.cross(axis),
            angular_b: rb.cross(axis),
            geometric_error,
            velocity_target: 0.0,
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSource {
    /// Row index in the joint table.
    Joint(usize),
    /// Index into the step's contact pairs.
    Contact(usize),
}

/// Solver-visible constraint: which body rows it touches and where it came from.
/// `None` means the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintDescriptor {
    pub body_a: Option<usize>,
    pub body_b: Option<usize>,
    pub source: ConstraintSource,
}

/// Contiguous run of descriptors that share no movable body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintBatch {
    pub range: Range<usize>,
}

/// Row ready for iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreparedRow {
    pub linear: Vec3,
    pub angular_a: Vec3,
    pub angular_b: Vec3,
    pub inertia_angular_a: Vec3,
    pub inertia_angular_b: Vec3,
    pub effective_mass: f32,
    pub position_bias: f32,
    pub velocity_bias: f32,
    pub gamma: f32,
    pub min_impulse: f32,
    pub max_impulse: f32,
    /// Non-zero for friction rows: bound is `±coefficient · Σλn` of the block.
    pub friction_coefficient: f32,
    pub accumulated_impulse: f32,
}

/// Prepared constraint covering a contiguous run of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConstraint {
    pub body_a: Option<usize>,
    pub body_b: Option<usize>,
    pub rows: Range<usize>,
    /// Normal rows for contacts; friction rows read their bound from these.
    pub normal_rows: Range<usize>,
}

#[derive(Debug, Default, Clone)]
pub struct SolverConstraints {
    pub blocks: Vec<SolverConstraint>,
    pub rows: Vec<PreparedRow>,
}

impl SolverConstraints {
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.rows.clear();
    }

    pub fn normal_impulse(&self, block: usize) -> f32 {
        self.blocks
            .get(block)
            .map(|b| self.rows[b.normal_rows.clone()].iter().map(|r| r.accumulated_impulse).sum())
            .unwrap_or(0.0)
    }
}

/// Contact-preparation parameters shared by every pair in a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactParams {
    pub dt: f32,
    pub bounce_threshold: f32,
    pub friction_anchor_tolerance: f32,
    pub bias_factor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveIterations {
    pub position: u32,
    pub velocity: u32,
}

/// Contact generation, solving and integration primitives used by a step.
pub trait SolverBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Appends contact points (normal from A to B) for two posed shapes and
    /// returns how many were written. `cache` is the pair's persistent slot.
    fn generate_contacts(
        &self,
        shape_a: &ColliderShape,
        pose_a: &Transform,
        shape_b: &ColliderShape,
        pose_b: &Transform,
        contact_distance: f32,
        cache: &mut PairCache,
        out: &mut Vec<ContactPoint>,
    ) -> usize;

    /// One solver body per table row; only the active dynamic prefix is movable.
    fn construct_solver_bodies(
        &self,
        bodies: &BodiesSoA,
        dt: f32,
        gravity: Vec3,
        parallel: bool,
        out: &mut Vec<SolverBody>,
    );

    /// Appends `descriptors` to `ordered` in batch order and appends the batches.
    /// Rows at or above `num_movable` never conflict.
    fn batch_constraints(
        &self,
        descriptors: &[ConstraintDescriptor],
        num_movable: usize,
        ordered: &mut Vec<ConstraintDescriptor>,
        batches: &mut Vec<ConstraintBatch>,
    );

    fn create_joint_constraints(
        &self,
        descriptor: &ConstraintDescriptor,
        rows: &[ConstraintRow],
        bodies: &[SolverBody],
        dt: f32,
        bias_factor: f32,
        out: &mut SolverConstraints,
    );

    fn create_contact_constraints(
        &self,
        descriptor: &ConstraintDescriptor,
        pair: &ContactPair,
        points: &[ContactPoint],
        bodies: &[SolverBody],
        params: &ContactParams,
        cache: Option<&mut PairCache>,
        out: &mut SolverConstraints,
    );

    fn solve_constraints(
        &self,
        constraints: &mut SolverConstraints,
        batches: &[ConstraintBatch],
        bodies: &[SolverBody],
        iterations: SolveIterations,
        deltas: &mut [MotionDelta],
    );

    fn integrate_bodies(
        &self,
        bodies: &mut [SolverBody],
        deltas: &[MotionDelta],
        dt: f32,
        parallel: bool,
    );
}
