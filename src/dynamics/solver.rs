//! Projected Gauss-Seidel backend.
//!
//! Rows are solved in batch order with accumulated-impulse clamping. The
//! position pass carries the positional bias and decides where bodies end up;
//! the velocity pass removes the bias so the stored velocity is not inflated
//! by error correction.

use glam::Vec3;

use super::backend::{
    ConstraintBatch, ConstraintDescriptor, ConstraintRow, ContactParams, MotionDelta,
    PreparedRow, RowKind, SolveIterations, SolverBackend, SolverBody, SolverConstraint,
    SolverConstraints,
};
use super::batcher::color_batches;
use super::friction::patch_anchors;
use super::integrator;
use crate::collision::contact::{ContactPair, ContactPoint, PairCache};
use crate::collision::narrowphase;
use crate::core::collider::ColliderShape;
use crate::core::soa::BodiesSoA;
use crate::core::types::Transform;
use crate::utils::math::tangent_basis;

const MIN_EFFECTIVE_MASS_DENOMINATOR: f32 = 1e-9;

/// CPU implementation of [`SolverBackend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PgsBackend;

impl PgsBackend {
    pub fn new() -> Self {
        Self
    }
}

fn body_or_world(bodies: &[SolverBody], index: Option<usize>) -> SolverBody {
    index
        .and_then(|i| bodies.get(i).copied())
        .unwrap_or_else(|| SolverBody::fixed(Transform::IDENTITY))
}

fn relative_velocity(row: &ConstraintRow, a: &SolverBody, b: &SolverBody) -> f32 {
    row.linear.dot(b.linear_velocity - a.linear_velocity) + row.angular_b.dot(b.angular_velocity)
        - row.angular_a.dot(a.angular_velocity)
}

/// Builds the iteration form of `row`; biases are filled in by the caller.
fn prepare_row(row: &ConstraintRow, a: &SolverBody, b: &SolverBody) -> (PreparedRow, f32) {
    let inertia_angular_a = a.inverse_inertia_world * row.angular_a;
    let inertia_angular_b = b.inverse_inertia_world * row.angular_b;
    let unit_response = (a.inverse_mass + b.inverse_mass) * row.linear.length_squared()
        + row.angular_a.dot(inertia_angular_a)
        + row.angular_b.dot(inertia_angular_b);

    let prepared = PreparedRow {
        linear: row.linear,
        angular_a: row.angular_a,
        angular_b: row.angular_b,
        inertia_angular_a,
        inertia_angular_b,
        effective_mass: invert_response(unit_response),
        position_bias: 0.0,
        velocity_bias: 0.0,
        gamma: 0.0,
        min_impulse: f32::MIN,
        max_impulse: f32::MAX,
        friction_coefficient: 0.0,
        accumulated_impulse: 0.0,
    };
    (prepared, unit_response)
}

fn invert_response(response: f32) -> f32 {
    if response > MIN_EFFECTIVE_MASS_DENOMINATOR {
        response.recip()
    } else {
        0.0
    }
}

/// Joint row: equality, one-sided limit or implicit spring.
fn prepare_joint_row(
    row: &ConstraintRow,
    a: &SolverBody,
    b: &SolverBody,
    dt: f32,
    bias_factor: f32,
) -> PreparedRow {
    let (mut prepared, unit_response) = prepare_row(row, a, b);
    let error = row.geometric_error;

    match row.kind {
        RowKind::Equality => {
            prepared.position_bias = bias_factor * error / dt - row.velocity_target;
            prepared.velocity_bias = -row.velocity_target;
        }
        RowKind::Inequality => {
            prepared.min_impulse = 0.0;
            if error >= 0.0 {
                prepared.position_bias = error / dt;
                prepared.velocity_bias = error / dt;
            } else {
                prepared.position_bias = bias_factor * error / dt;
            }
        }
        RowKind::Spring {
            stiffness,
            damping,
            acceleration,
            min_impulse,
            max_impulse,
        } => {
            let (stiffness, damping) = if acceleration && unit_response > MIN_EFFECTIVE_MASS_DENOMINATOR {
                (stiffness / unit_response, damping / unit_response)
            } else {
                (stiffness, damping)
            };
            let denominator = damping + dt * stiffness;
            if denominator > 0.0 {
                let gamma = 1.0 / (dt * denominator);
                let bias = (stiffness * error - damping * row.velocity_target) / denominator;
                prepared.gamma = gamma;
                prepared.position_bias = bias;
                prepared.velocity_bias = bias;
                prepared.effective_mass = invert_response(unit_response + gamma);
            } else {
                prepared.effective_mass = 0.0;
            }
            prepared.min_impulse = min_impulse;
            prepared.max_impulse = max_impulse;
        }
    }
    prepared
}

fn push_block(
    descriptor: &ConstraintDescriptor,
    rows: impl IntoIterator<Item = PreparedRow>,
    normal_count: usize,
    out: &mut SolverConstraints,
) {
    let start = out.rows.len();
    out.rows.extend(rows);
    out.blocks.push(SolverConstraint {
        body_a: descriptor.body_a,
        body_b: descriptor.body_b,
        rows: start..out.rows.len(),
        normal_rows: start..start + normal_count,
    });
}

/// Working velocities of the two bodies of a block.
struct BlockVelocities {
    linear_a: Vec3,
    angular_a: Vec3,
    linear_b: Vec3,
    angular_b: Vec3,
}

impl BlockVelocities {
    fn load(block: &SolverConstraint, bodies: &[SolverBody], deltas: &[MotionDelta]) -> Self {
        let (linear_a, angular_a) = working_velocity(block.body_a, bodies, deltas);
        let (linear_b, angular_b) = working_velocity(block.body_b, bodies, deltas);
        Self {
            linear_a,
            angular_a,
            linear_b,
            angular_b,
        }
    }

    fn store(&self, block: &SolverConstraint, bodies: &[SolverBody], deltas: &mut [MotionDelta]) {
        if let Some(a) = block.body_a {
            deltas[a].linear = self.linear_a - bodies[a].linear_velocity;
            deltas[a].angular = self.angular_a - bodies[a].angular_velocity;
        }
        if let Some(b) = block.body_b {
            deltas[b].linear = self.linear_b - bodies[b].linear_velocity;
            deltas[b].angular = self.angular_b - bodies[b].angular_velocity;
        }
    }
}

fn working_velocity(index: Option<usize>, bodies: &[SolverBody], deltas: &[MotionDelta]) -> (Vec3, Vec3) {
    match index {
        Some(i) => (
            bodies[i].linear_velocity + deltas[i].linear,
            bodies[i].angular_velocity + deltas[i].angular,
        ),
        None => (Vec3::ZERO, Vec3::ZERO),
    }
}

fn solve_block(
    block: &SolverConstraint,
    rows: &mut [PreparedRow],
    inverse_mass_a: f32,
    inverse_mass_b: f32,
    velocities: &mut BlockVelocities,
    use_position_bias: bool,
) {
    let mut normal_impulse = 0.0;
    let normal_end = block.normal_rows.end - block.rows.start;

    for (local, row) in rows.iter_mut().enumerate() {
        let relative = row.linear.dot(velocities.linear_b - velocities.linear_a)
            + row.angular_b.dot(velocities.angular_b)
            - row.angular_a.dot(velocities.angular_a);
        let bias = if use_position_bias {
            row.position_bias
        } else {
            row.velocity_bias
        };

        let (min_impulse, max_impulse) = if row.friction_coefficient > 0.0 {
            let bound = row.friction_coefficient * normal_impulse;
            (-bound, bound)
        } else {
            (row.min_impulse, row.max_impulse)
        };

        let delta = -(relative + bias + row.gamma * row.accumulated_impulse) * row.effective_mass;
        let previous = row.accumulated_impulse;
        row.accumulated_impulse = (previous + delta).clamp(min_impulse, max_impulse);
        let applied = row.accumulated_impulse - previous;

        if applied != 0.0 {
            velocities.linear_a -= row.linear * (inverse_mass_a * applied);
            velocities.angular_a -= row.inertia_angular_a * applied;
            velocities.linear_b += row.linear * (inverse_mass_b * applied);
            velocities.angular_b += row.inertia_angular_b * applied;
        }

        if local < normal_end {
            normal_impulse += row.accumulated_impulse;
        }
    }
}

fn solve_pass(
    constraints: &mut SolverConstraints,
    batches: &[ConstraintBatch],
    bodies: &[SolverBody],
    deltas: &mut [MotionDelta],
    use_position_bias: bool,
) {
    let SolverConstraints { blocks, rows } = constraints;
    for batch in batches {
        for block in &blocks[batch.range.clone()] {
            let mut velocities = BlockVelocities::load(block, bodies, deltas);
            let inverse_mass_a = block.body_a.map_or(0.0, |a| bodies[a].inverse_mass);
            let inverse_mass_b = block.body_b.map_or(0.0, |b| bodies[b].inverse_mass);
            solve_block(
                block,
                &mut rows[block.rows.clone()],
                inverse_mass_a,
                inverse_mass_b,
                &mut velocities,
                use_position_bias,
            );
            velocities.store(block, bodies, deltas);
        }
    }
}

impl SolverBackend for PgsBackend {
    fn name(&self) -> &str {
        "cpu-pgs"
    }

    fn generate_contacts(
        &self,
        shape_a: &ColliderShape,
        pose_a: &Transform,
        shape_b: &ColliderShape,
        pose_b: &Transform,
        contact_distance: f32,
        cache: &mut PairCache,
        out: &mut Vec<ContactPoint>,
    ) -> usize {
        let start = out.len();
        let count = narrowphase::generate_contacts(shape_a, pose_a, shape_b, pose_b, contact_distance, out);
        cache.manifold.clear();
        cache.manifold.extend_from_slice(&out[start..]);
        count
    }

    fn construct_solver_bodies(
        &self,
        bodies: &BodiesSoA,
        dt: f32,
        gravity: Vec3,
        parallel: bool,
        out: &mut Vec<SolverBody>,
    ) {
        integrator::build_solver_bodies(bodies, dt, gravity, parallel, out);
    }

    fn batch_constraints(
        &self,
        descriptors: &[ConstraintDescriptor],
        num_movable: usize,
        ordered: &mut Vec<ConstraintDescriptor>,
        batches: &mut Vec<ConstraintBatch>,
    ) {
        color_batches(descriptors, num_movable, ordered, batches);
    }

    fn create_joint_constraints(
        &self,
        descriptor: &ConstraintDescriptor,
        rows: &[ConstraintRow],
        bodies: &[SolverBody],
        dt: f32,
        bias_factor: f32,
        out: &mut SolverConstraints,
    ) {
        let a = body_or_world(bodies, descriptor.body_a);
        let b = body_or_world(bodies, descriptor.body_b);
        push_block(
            descriptor,
            rows.iter().map(|row| prepare_joint_row(row, &a, &b, dt, bias_factor)),
            0,
            out,
        );
    }

    fn create_contact_constraints(
        &self,
        descriptor: &ConstraintDescriptor,
        pair: &ContactPair,
        points: &[ContactPoint],
        bodies: &[SolverBody],
        params: &ContactParams,
        cache: Option<&mut PairCache>,
        out: &mut SolverConstraints,
    ) {
        let a = body_or_world(bodies, descriptor.body_a);
        let b = body_or_world(bodies, descriptor.body_b);
        let dt = params.dt;
        let max_depenetration = a.max_depenetration_velocity.min(b.max_depenetration_velocity);
        let max_impulse = a.max_contact_impulse.min(b.max_contact_impulse);
        let restitution = pair.material.restitution;

        let mut rows: Vec<PreparedRow> = Vec::with_capacity(points.len() + 2);
        for point in points {
            let row = ConstraintRow::linear(
                point.normal,
                point.position - a.transform.position,
                point.position - b.transform.position,
                point.separation,
                RowKind::Inequality,
            );
            let (mut prepared, _) = prepare_row(&row, &a, &b);
            prepared.min_impulse = 0.0;
            prepared.max_impulse = max_impulse;

            let separation = point.separation;
            if separation > 0.0 {
                prepared.position_bias = separation / dt;
                prepared.velocity_bias = separation / dt;
            } else {
                prepared.position_bias = (params.bias_factor * separation / dt).max(-max_depenetration);
            }

            let approach = relative_velocity(&row, &a, &b);
            if restitution > 0.0 && approach < -params.bounce_threshold {
                prepared.position_bias = restitution * approach;
                prepared.velocity_bias = restitution * approach;
            }
            rows.push(prepared);
        }
        let normal_count = rows.len();

        let cached = cache.as_ref().and_then(|slot| slot.friction);
        let anchors = patch_anchors(points, cached.as_ref(), &a, &b, params.friction_anchor_tolerance);
        if let Some(anchors) = anchors {
            let coefficient = if anchors.sticking {
                pair.material.static_friction
            } else {
                pair.material.dynamic_friction
            };
            if coefficient > 0.0 {
                let (t0, t1) = tangent_basis(anchors.normal);
                for tangent in [t0, t1] {
                    let drift = if anchors.sticking {
                        (anchors.on_b - anchors.on_a).dot(tangent)
                    } else {
                        0.0
                    };
                    let row = ConstraintRow::linear(
                        tangent,
                        anchors.on_a - a.transform.position,
                        anchors.on_b - b.transform.position,
                        drift,
                        RowKind::Equality,
                    );
                    let (mut prepared, _) = prepare_row(&row, &a, &b);
                    prepared.position_bias = params.bias_factor * drift / dt;
                    prepared.friction_coefficient = coefficient;
                    rows.push(prepared);
                }
            }
            if let Some(slot) = cache {
                slot.friction = Some(anchors.to_patch(&a, &b));
            }
        }

        push_block(descriptor, rows, normal_count, out);
    }

    fn solve_constraints(
        &self,
        constraints: &mut SolverConstraints,
        batches: &[ConstraintBatch],
        bodies: &[SolverBody],
        iterations: SolveIterations,
        deltas: &mut [MotionDelta],
    ) {
        for delta in deltas.iter_mut() {
            *delta = MotionDelta::default();
        }

        for _ in 0..iterations.position {
            solve_pass(constraints, batches, bodies, deltas, true);
        }
        for delta in deltas.iter_mut() {
            delta.position_linear = delta.linear;
            delta.position_angular = delta.angular;
        }
        for _ in 0..iterations.velocity {
            solve_pass(constraints, batches, bodies, deltas, false);
        }
    }

    fn integrate_bodies(&self, bodies: &mut [SolverBody], deltas: &[MotionDelta], dt: f32, parallel: bool) {
        integrator::integrate_bodies(bodies, deltas, dt, parallel);
    }
}
