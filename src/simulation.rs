//! The step orchestrator.
//!
//! A [`Simulation`] owns the body and joint tables, the contact cache and all
//! per-step scratch. Each [`Simulation::simulate`] call runs, in order:
//! construct bodies, rebuild the pruning cache (when dirty), generate contacts,
//! batch constraints, prepare constraints, solve and integrate, reset scratch.

use std::time::Duration;

use glam::Vec3;
use log::{debug, warn};

use crate::collision::contact::{CollisionFilter, ContactBuffers, ContactCache, ContactPair};
use crate::config::{SimulationConfig, DEFAULT_BIAS_FACTOR};
use crate::core::collider::{build_shape_catalog, Collider};
use crate::core::constraints::{JointData, JointDesc};
use crate::core::rigidbody::{BodyDesc, BodyKind, RigidBodyData};
use crate::core::soa::{BodiesSoA, BodyMut, BodyRef, BodyRow, JointsSoA};
use crate::core::types::{Transform, Velocity};
use crate::dynamics::backend::{
    ConstraintBatch, ConstraintDescriptor, ConstraintSource, ContactParams, SolveIterations,
    SolverBackend, SolverConstraints,
};
use crate::dynamics::batcher::{realign_joint_rows, unbatched};
use crate::dynamics::d6::derive_rows;
use crate::dynamics::solver::PgsBackend;
use crate::error::PhysicsError;
use crate::utils::allocator::{BodyHandle, Handle, JointHandle, OwnerId};
use crate::utils::logging::ScopedTimer;
use crate::utils::math::shortest_rotation_vector;
use crate::utils::scratch::{DoubleBuffered, StepScratch};

/// Wall-clock time spent in each phase of the last step.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PhaseTimings {
    pub construct_bodies: Duration,
    pub generate_contacts: Duration,
    pub batch_constraints: Duration,
    pub prepare_constraints: Duration,
    pub solve_and_integrate: Duration,
}

/// Counters describing the last completed step.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StepStats {
    /// 1-based step number.
    pub step: u64,
    /// Time step actually used, after clamping.
    pub dt: f32,
    pub contact_pairs: usize,
    pub contact_points: usize,
    pub joint_constraints: usize,
    pub joint_rows: usize,
    pub joint_batches: usize,
    pub contact_batches: usize,
    pub pruning_cache_rebuilt: bool,
    pub joint_table_swaps: usize,
    pub timings: PhaseTimings,
}

/// Immediate-mode rigid-body simulation.
pub struct Simulation {
    config: SimulationConfig,
    bodies: BodiesSoA,
    joints: JointsSoA,
    filter: CollisionFilter,
    contact_cache: ContactCache,
    backend: Box<dyn SolverBackend>,

    contacts: DoubleBuffered<ContactBuffers>,
    constraints: DoubleBuffered<SolverConstraints>,
    scratch: StepScratch,

    /// Joint descriptors in solver order; valid while `joints_dirty` is false.
    joint_descriptors: Vec<ConstraintDescriptor>,
    joint_batches: Vec<ConstraintBatch>,

    pruning_dirty: bool,
    joints_dirty: bool,
    iterations: SolveIterations,
    step: u64,
    stats: StepStats,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        let owner = OwnerId::next();
        debug!("creating simulation {:?} with {:?}", owner, config);

        Ok(Self {
            config,
            bodies: BodiesSoA::new(owner),
            joints: JointsSoA::new(owner),
            filter: CollisionFilter::default(),
            contact_cache: ContactCache::new(),
            backend: Box::new(PgsBackend::new()),
            contacts: DoubleBuffered::new(config.persistent_contacts),
            constraints: DoubleBuffered::new(config.persistent_contacts),
            scratch: StepScratch::default(),
            joint_descriptors: Vec::new(),
            joint_batches: Vec::new(),
            pruning_dirty: true,
            joints_dirty: true,
            iterations: SolveIterations {
                position: 0,
                velocity: 0,
            },
            step: 0,
            stats: StepStats::default(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn set_solver_backend<B>(&mut self, backend: B)
    where
        B: SolverBackend + 'static,
    {
        debug!("switching solver backend to {}", backend.name());
        self.backend = Box::new(backend);
    }

    pub fn solver_backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn create_static_actor(&mut self, colliders: &[Collider], actor_to_world: Transform) -> BodyHandle {
        self.insert_body(BodyRow {
            kind: BodyKind::Static,
            actor_to_body: Transform::IDENTITY,
            transform: actor_to_world,
            data: RigidBodyData::fixed(),
            shapes: build_shape_catalog(colliders, &Transform::IDENTITY),
        })
    }

    pub fn create_kinematic_actor(&mut self, desc: &BodyDesc, actor_to_world: Transform) -> BodyHandle {
        self.insert_body(Self::body_row(BodyKind::Kinematic, desc, actor_to_world))
    }

    pub fn create_dynamic_actor(&mut self, desc: &BodyDesc, actor_to_world: Transform) -> BodyHandle {
        self.iterations.position = self.iterations.position.max(desc.position_iterations);
        self.iterations.velocity = self.iterations.velocity.max(desc.velocity_iterations);
        self.insert_body(Self::body_row(BodyKind::Dynamic, desc, actor_to_world))
    }

    fn body_row(kind: BodyKind, desc: &BodyDesc, actor_to_world: Transform) -> BodyRow {
        BodyRow {
            kind,
            actor_to_body: desc.center_of_mass,
            transform: actor_to_world.combine(&desc.center_of_mass),
            data: RigidBodyData::from_desc(desc),
            shapes: build_shape_catalog(&desc.colliders, &desc.center_of_mass),
        }
    }

    fn insert_body(&mut self, row: BodyRow) -> BodyHandle {
        let slot = self.bodies.insert(row);
        self.pruning_dirty = true;
        self.joints_dirty = true;
        self.bodies.slots.body_handle(slot)
    }

    /// Joins `body_a` to `body_b`, or to the world when `body_b` is `None`.
    ///
    /// Returns `Ok(None)` when the joint constrains nothing.
    pub fn create_joint(
        &mut self,
        desc: &JointDesc,
        body_a: &BodyHandle,
        body_b: Option<&BodyHandle>,
    ) -> Result<Option<JointHandle>, PhysicsError> {
        let row_a = self.bodies.slots.resolve(body_a)?;
        let row_b = body_b.map(|h| self.bodies.slots.resolve(h)).transpose()?;

        let data = JointData::new(
            desc,
            &self.bodies.actor_to_body[row_a],
            row_b.map(|b| &self.bodies.actor_to_body[b]),
        );
        if !data.has_active_constraints() {
            debug!("discarding joint without locked, limited or driven axes");
            return Ok(None);
        }

        let slot = self.joints.insert(data, body_a.slot(), body_b.map(|h| h.slot()));
        self.joints_dirty = true;
        Ok(Some(self.joints.slots.joint_handle(slot)))
    }

    /// Moves the LOD cursor over the dynamic partition. Returns the count in effect.
    pub fn set_num_active_bodies(&mut self, count: usize) -> usize {
        let previous = self.bodies.num_active_simulated();
        let applied = self.bodies.set_num_active_simulated(count);
        if applied != count {
            warn!(
                "requested {} active bodies but only {} dynamic bodies exist",
                count, applied
            );
        }
        if applied != previous {
            self.joints_dirty = true;
        }
        applied
    }

    pub fn set_ignore_collision_pair_table(
        &mut self,
        pairs: &[(&BodyHandle, &BodyHandle)],
    ) -> Result<(), PhysicsError> {
        let mut slots = Vec::with_capacity(pairs.len());
        for (a, b) in pairs {
            self.bodies.slots.resolve(*a)?;
            self.bodies.slots.resolve(*b)?;
            slots.push((a.slot(), b.slot()));
        }
        self.filter.set_ignored_pairs(slots);
        self.pruning_dirty = true;
        Ok(())
    }

    pub fn set_ignore_collision_actors(&mut self, actors: &[&BodyHandle]) -> Result<(), PhysicsError> {
        let mut slots = Vec::with_capacity(actors.len());
        for handle in actors {
            self.bodies.slots.resolve(*handle)?;
            slots.push(handle.slot());
        }
        self.filter.set_ignored_actors(slots);
        self.pruning_dirty = true;
        Ok(())
    }

    pub fn body(&self, handle: &BodyHandle) -> Option<BodyRef<'_>> {
        let row = self.bodies.slots.resolve(handle).ok()?;
        self.bodies.get(row)
    }

    pub fn body_mut(&mut self, handle: &BodyHandle) -> Option<BodyMut<'_>> {
        let row = self.bodies.slots.resolve(handle).ok()?;
        self.bodies.get_mut(row)
    }

    pub fn joint(&self, handle: &JointHandle) -> Option<&JointData> {
        let row = self.joints.slots.resolve(handle).ok()?;
        self.joints.data.get(row)
    }

    pub fn joint_mut(&mut self, handle: &JointHandle) -> Option<&mut JointData> {
        let row = self.joints.slots.resolve(handle).ok()?;
        self.joints.data.get_mut(row)
    }

    pub fn body_table(&self) -> &BodiesSoA {
        &self.bodies
    }

    pub fn joint_table(&self) -> &JointsSoA {
        &self.joints
    }

    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    pub fn num_dynamic_bodies(&self) -> usize {
        self.bodies.num_simulated()
    }

    pub fn num_kinematic_bodies(&self) -> usize {
        self.bodies.num_kinematic()
    }

    pub fn num_static_bodies(&self) -> usize {
        self.bodies.num_static()
    }

    pub fn num_active_bodies(&self) -> usize {
        self.bodies.num_active_simulated()
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn iterations(&self) -> SolveIterations {
        self.iterations
    }

    pub fn last_step(&self) -> &StepStats {
        &self.stats
    }

    /// Contact pairs generated by the last step.
    pub fn contact_pairs(&self) -> &[ContactPair] {
        &self.contacts.current().pairs
    }

    pub fn contacts(&self) -> &ContactBuffers {
        self.contacts.current()
    }

    /// Contact pairs of the step before the last one, kept while contacts are persistent.
    pub fn previous_contact_pairs(&self) -> Option<&[ContactPair]> {
        self.contacts.previous().map(|buffers| buffers.pairs.as_slice())
    }

    pub fn contact_cache(&self) -> &ContactCache {
        &self.contact_cache
    }

    /// Advances every active body by `dt` (clamped to `max_dt`) under `gravity`.
    pub fn simulate(&mut self, dt: f32, gravity: Vec3) {
        if !(dt > 0.0) || !dt.is_finite() {
            warn!("ignoring simulate call with non-positive time step {dt}");
            return;
        }
        let dt = if dt > self.config.max_dt {
            warn!("clamping time step {} to {}", dt, self.config.max_dt);
            self.config.max_dt
        } else {
            dt
        };

        self.step += 1;
        let mut stats = StepStats {
            step: self.step,
            dt,
            ..StepStats::default()
        };
        self.scratch.reset();
        self.contacts.begin_step();
        self.constraints.begin_step();

        let timer = ScopedTimer::new("simulate::construct_bodies");
        self.construct_bodies(dt, gravity);
        stats.timings.construct_bodies = timer.finish();

        let timer = ScopedTimer::new("simulate::generate_contacts");
        if self.pruning_dirty {
            self.contact_cache.rebuild(&self.bodies, &self.filter);
            self.pruning_dirty = false;
            stats.pruning_cache_rebuilt = true;
        }
        self.contact_cache.generate(
            &self.bodies,
            self.backend.as_ref(),
            self.config.contact_distance,
            self.step,
            self.config.persistent_contacts,
            self.contacts.current_mut(),
        );
        stats.contact_pairs = self.contacts.current().pairs.len();
        stats.contact_points = self.contacts.current().points.len();
        stats.timings.generate_contacts = timer.finish();

        let timer = ScopedTimer::new("simulate::batch_constraints");
        stats.joint_table_swaps = self.batch_constraints();
        stats.joint_constraints = self.joint_descriptors.len();
        stats.joint_batches = self.joint_batches.len();
        stats.contact_batches = self.scratch.batches.len() - self.joint_batches.len();
        stats.timings.batch_constraints = timer.finish();

        let timer = ScopedTimer::new("simulate::prepare_constraints");
        stats.joint_rows = self.prepare_constraints(dt);
        stats.timings.prepare_constraints = timer.finish();

        let timer = ScopedTimer::new("simulate::solve_and_integrate");
        self.solve_and_integrate(dt);
        stats.timings.solve_and_integrate = timer.finish();

        self.scratch.reset();
        self.stats = stats;
    }

    fn construct_bodies(&mut self, dt: f32, gravity: Vec3) {
        let bodies = &mut self.bodies;
        for i in 0..bodies.num_active_simulated() {
            let pending = std::mem::take(&mut bodies.pending_accelerations[i]);
            bodies.velocities[i].linear += pending * dt;
        }

        let kinematic = bodies.num_simulated()..bodies.num_simulated() + bodies.num_kinematic();
        for i in kinematic {
            let target = bodies.kinematic_targets[i];
            if !target.is_set {
                continue;
            }
            let current = bodies.transforms[i];
            bodies.velocities[i] = Velocity {
                linear: (target.transform.position - current.position) / dt,
                angular: shortest_rotation_vector(target.transform.rotation * current.rotation.inverse())
                    / dt,
            };
        }

        self.backend.construct_solver_bodies(
            &self.bodies,
            dt,
            gravity,
            self.config.parallel,
            &mut self.scratch.solver_bodies,
        );
    }

    /// Rebuilds joint ordering when dirty and batches this step's contacts.
    /// Returns the number of joint-table swaps performed.
    fn batch_constraints(&mut self) -> usize {
        let num_movable = self.bodies.num_active_simulated();
        let mut swaps = 0;

        if self.joints_dirty {
            let mut descriptors = Vec::with_capacity(self.joints.len());
            for row in 0..self.joints.len() {
                if let Some(descriptor) = self.joint_descriptor(row) {
                    descriptors.push(descriptor);
                }
            }

            self.joint_descriptors.clear();
            self.joint_batches.clear();
            if self.config.batch_joints {
                self.backend.batch_constraints(
                    &descriptors,
                    num_movable,
                    &mut self.joint_descriptors,
                    &mut self.joint_batches,
                );
            } else {
                unbatched(&descriptors, &mut self.joint_descriptors, &mut self.joint_batches);
            }
            swaps = realign_joint_rows(&mut self.joint_descriptors, &mut self.joints);
            self.joints_dirty = false;
            debug!(
                "rebuilt joint ordering: {} active joints in {} batches",
                self.joint_descriptors.len(),
                self.joint_batches.len()
            );
        }

        let scratch = &mut self.scratch;
        scratch.batches.extend(self.joint_batches.iter().cloned());
        scratch.contact_descriptors.extend(
            self.contacts
                .current()
                .pairs
                .iter()
                .enumerate()
                .map(|(i, pair)| ConstraintDescriptor {
                    body_a: Some(pair.body_a),
                    body_b: Some(pair.body_b),
                    source: ConstraintSource::Contact(i),
                }),
        );

        let first_contact_batch = scratch.batches.len();
        self.backend.batch_constraints(
            &scratch.contact_descriptors,
            num_movable,
            &mut scratch.ordered_contacts,
            &mut scratch.batches,
        );
        let offset = self.joint_descriptors.len();
        for batch in &mut scratch.batches[first_contact_batch..] {
            batch.range = batch.range.start + offset..batch.range.end + offset;
        }
        swaps
    }

    /// Descriptor for joint-table row `row`, or `None` when the joint sits out this step.
    fn joint_descriptor(&self, row: usize) -> Option<ConstraintDescriptor> {
        let body_a = self.bodies.slots.row_of_slot(self.joints.body_a[row])?;
        let body_b = match self.joints.body_b[row] {
            Some(slot) => Some(self.bodies.slots.row_of_slot(slot)?),
            None => None,
        };

        if self.bodies.is_inactive_dynamic(body_a) || body_b.is_some_and(|b| self.bodies.is_inactive_dynamic(b)) {
            return None;
        }
        let num_active = self.bodies.num_active_simulated();
        if body_a >= num_active && body_b.map_or(true, |b| b >= num_active) {
            return None;
        }

        Some(ConstraintDescriptor {
            body_a: Some(body_a),
            body_b,
            source: ConstraintSource::Joint(row),
        })
    }

    /// Returns the number of joint rows prepared.
    fn prepare_constraints(&mut self, dt: f32) -> usize {
        let constraints = self.constraints.current_mut();
        let solver_bodies = &self.scratch.solver_bodies;
        let mut joint_rows = 0;

        for descriptor in &self.joint_descriptors {
            let ConstraintSource::Joint(row) = descriptor.source else {
                continue;
            };
            let pose_a = descriptor
                .body_a
                .map_or(Transform::IDENTITY, |a| solver_bodies[a].transform);
            let pose_b = descriptor
                .body_b
                .map_or(Transform::IDENTITY, |b| solver_bodies[b].transform);

            self.scratch.joint_rows.clear();
            joint_rows += derive_rows(&self.joints.data[row], &pose_a, &pose_b, dt, &mut self.scratch.joint_rows);
            self.backend.create_joint_constraints(
                descriptor,
                &self.scratch.joint_rows,
                solver_bodies,
                dt,
                DEFAULT_BIAS_FACTOR,
                constraints,
            );
        }

        let params = ContactParams {
            dt,
            bounce_threshold: self.config.bounce_threshold,
            friction_anchor_tolerance: self.config.friction_anchor_tolerance,
            bias_factor: DEFAULT_BIAS_FACTOR,
        };
        let contacts = self.contacts.current();
        for descriptor in &self.scratch.ordered_contacts {
            let ConstraintSource::Contact(index) = descriptor.source else {
                continue;
            };
            let pair = &contacts.pairs[index];
            let cache = if self.config.persistent_contacts {
                self.contact_cache.pair_cache_mut(&pair.key)
            } else {
                None
            };
            self.backend.create_contact_constraints(
                descriptor,
                pair,
                contacts.points_of(pair),
                solver_bodies,
                &params,
                cache,
                constraints,
            );
        }
        joint_rows
    }

    fn solve_and_integrate(&mut self, dt: f32) {
        let scratch = &mut self.scratch;
        scratch
            .motion_deltas
            .resize(scratch.solver_bodies.len(), Default::default());

        self.backend.solve_constraints(
            self.constraints.current_mut(),
            &scratch.batches,
            &scratch.solver_bodies,
            self.iterations,
            &mut scratch.motion_deltas,
        );
        self.backend.integrate_bodies(
            &mut scratch.solver_bodies,
            &scratch.motion_deltas,
            dt,
            self.config.parallel,
        );

        let bodies = &mut self.bodies;
        for (i, solved) in scratch
            .solver_bodies
            .iter()
            .enumerate()
            .take(bodies.num_active_simulated())
        {
            bodies.transforms[i] = solved.transform;
            bodies.velocities[i] = Velocity {
                linear: solved.linear_velocity,
                angular: solved.angular_velocity,
            };
        }

        for i in 0..bodies.len() {
            let target = &mut bodies.kinematic_targets[i];
            if target.is_set {
                bodies.transforms[i] = target.transform;
                bodies.velocities[i] = Velocity::default();
            }
            target.is_set = false;
        }
    }
}
