use crate::core::collider::Shape;
use crate::core::constraints::JointData;
use crate::core::rigidbody::{BodyKind, RigidBodyData};
use crate::core::types::{Transform, Velocity};
use crate::dynamics::forces::{self, ForceKind, RadialFalloff};
use crate::utils::allocator::{OwnerId, SlotIndex};
use glam::Vec3;
use log::{debug, trace};

/// Target pose recorded by `set_kinematic_target`, consumed by the next step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicTarget {
    /// Target pose of the body frame.
    pub transform: Transform,
    pub is_set: bool,
}

impl Default for KinematicTarget {
    fn default() -> Self {
        Self {
            transform: Transform::IDENTITY,
            is_set: false,
        }
    }
}

/// Structure-of-Arrays storage for every body in a simulation.
///
/// Rows are partitioned: `[0, num_simulated)` dynamic, then kinematic, then static.
/// Handles reach rows through `slots`, which every swap keeps in sync.
pub struct BodiesSoA {
    pub(crate) slots: SlotIndex,

    pub kinds: Vec<BodyKind>,
    /// Pose of the body frame in actor space. Fixed at creation.
    pub actor_to_body: Vec<Transform>,
    /// Authoritative body-frame pose in world space.
    pub transforms: Vec<Transform>,
    pub velocities: Vec<Velocity>,
    pub data: Vec<RigidBodyData>,
    pub shapes: Vec<Vec<Shape>>,
    pub pending_accelerations: Vec<Vec3>,
    pub kinematic_targets: Vec<KinematicTarget>,

    num_simulated: usize,
    num_kinematic: usize,
    num_active_simulated: usize,
}

/// Everything needed to append one body row.
pub struct BodyRow {
    pub kind: BodyKind,
    pub actor_to_body: Transform,
    pub transform: Transform,
    pub data: RigidBodyData,
    pub shapes: Vec<Shape>,
}

impl BodiesSoA {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            slots: SlotIndex::new(owner),
            kinds: Vec::new(),
            actor_to_body: Vec::new(),
            transforms: Vec::new(),
            velocities: Vec::new(),
            data: Vec::new(),
            shapes: Vec::new(),
            pending_accelerations: Vec::new(),
            kinematic_targets: Vec::new(),
            num_simulated: 0,
            num_kinematic: 0,
            num_active_simulated: 0,
        }
    }

    /// Appends a row, restores the partition and returns the new row's slot.
    pub fn insert(&mut self, row: BodyRow) -> u32 {
        let kind = row.kind;
        let index = self.push(row);
        let slot = self.slots.push_row();

        let kinematic_start = self.num_simulated;
        let static_start = self.num_simulated + self.num_kinematic;
        match kind {
            BodyKind::Dynamic => {
                // The first static (if any) goes to the end, then the first kinematic
                // (if any) moves behind the kinematic block.
                self.swap_rows(index, static_start);
                self.swap_rows(static_start, kinematic_start);
                self.num_simulated += 1;
                self.num_active_simulated = self.num_simulated;
            }
            BodyKind::Kinematic => {
                self.swap_rows(index, static_start);
                self.num_kinematic += 1;
            }
            BodyKind::Static => {}
        }

        debug!(
            "inserted {:?} body (slot {}), table now {} dynamic / {} kinematic / {} static",
            kind,
            slot,
            self.num_simulated,
            self.num_kinematic,
            self.num_static()
        );
        slot
    }

    fn push(&mut self, row: BodyRow) -> usize {
        let index = self.kinds.len();
        self.kinds.push(row.kind);
        self.actor_to_body.push(row.actor_to_body);
        self.transforms.push(row.transform);
        self.velocities.push(Velocity::default());
        self.data.push(row.data);
        self.shapes.push(row.shapes);
        self.pending_accelerations.push(Vec3::ZERO);
        self.kinematic_targets.push(KinematicTarget::default());
        index
    }

    /// Swaps every column of rows `a` and `b` and re-points their handles.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        trace!("swapping body rows {a} and {b}");
        self.kinds.swap(a, b);
        self.actor_to_body.swap(a, b);
        self.transforms.swap(a, b);
        self.velocities.swap(a, b);
        self.data.swap(a, b);
        self.shapes.swap(a, b);
        self.pending_accelerations.swap(a, b);
        self.kinematic_targets.swap(a, b);
        self.slots.swap_rows(a, b);
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn num_simulated(&self) -> usize {
        self.num_simulated
    }

    pub fn num_kinematic(&self) -> usize {
        self.num_kinematic
    }

    pub fn num_static(&self) -> usize {
        self.len() - self.num_simulated - self.num_kinematic
    }

    pub fn num_active_simulated(&self) -> usize {
        self.num_active_simulated
    }

    /// Moves the LOD cursor. Returns the clamped value actually stored.
    pub fn set_num_active_simulated(&mut self, count: usize) -> usize {
        self.num_active_simulated = count.min(self.num_simulated);
        self.num_active_simulated
    }

    /// True for dynamic rows past the LOD cursor.
    pub fn is_inactive_dynamic(&self, index: usize) -> bool {
        index >= self.num_active_simulated && index < self.num_simulated
    }

    pub fn get(&self, index: usize) -> Option<BodyRef<'_>> {
        (index < self.len()).then_some(BodyRef { soa: self, index })
    }

    pub fn get_mut(&mut self, index: usize) -> Option<BodyMut<'_>> {
        if index < self.len() {
            Some(BodyMut { soa: self, index })
        } else {
            None
        }
    }
}

/// Read-only view of one body row.
pub struct BodyRef<'a> {
    soa: &'a BodiesSoA,
    index: usize,
}

impl<'a> BodyRef<'a> {
    /// Current dense row. Changes whenever the table is reordered.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> BodyKind {
        self.soa.kinds[self.index]
    }

    pub fn is_simulated(&self) -> bool {
        self.kind() == BodyKind::Dynamic
    }

    /// Actor (caller-facing) pose.
    pub fn world_transform(&self) -> Transform {
        self.soa.transforms[self.index].combine(&self.soa.actor_to_body[self.index].inverse())
    }

    /// Body-frame (centre of mass) pose.
    pub fn body_transform(&self) -> Transform {
        self.soa.transforms[self.index]
    }

    pub fn actor_to_body(&self) -> Transform {
        self.soa.actor_to_body[self.index]
    }

    pub fn kinematic_target(&self) -> KinematicTarget {
        self.soa.kinematic_targets[self.index]
    }

    pub fn pending_acceleration(&self) -> Vec3 {
        self.soa.pending_accelerations[self.index]
    }

    pub fn linear_velocity(&self) -> Vec3 {
        self.soa.velocities[self.index].linear
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.soa.velocities[self.index].angular
    }

    pub fn linear_damping(&self) -> f32 {
        self.soa.data[self.index].linear_damping
    }

    pub fn angular_damping(&self) -> f32 {
        self.soa.data[self.index].angular_damping
    }

    pub fn max_linear_velocity_squared(&self) -> f32 {
        self.soa.data[self.index].max_linear_velocity_squared
    }

    pub fn max_angular_velocity_squared(&self) -> f32 {
        self.soa.data[self.index].max_angular_velocity_squared
    }

    pub fn inverse_mass(&self) -> f32 {
        self.soa.data[self.index].inverse_mass
    }

    pub fn inverse_inertia(&self) -> Vec3 {
        self.soa.data[self.index].inverse_inertia
    }

    pub fn max_depenetration_velocity(&self) -> f32 {
        self.soa.data[self.index].max_depenetration_velocity
    }

    pub fn max_contact_impulse(&self) -> f32 {
        self.soa.data[self.index].max_contact_impulse
    }

    pub fn shapes(&self) -> &'a [Shape] {
        &self.soa.shapes[self.index]
    }
}

/// Mutable view of one body row.
pub struct BodyMut<'a> {
    soa: &'a mut BodiesSoA,
    index: usize,
}

impl<'a> BodyMut<'a> {
    pub fn view(&self) -> BodyRef<'_> {
        BodyRef {
            soa: &*self.soa,
            index: self.index,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> BodyKind {
        self.soa.kinds[self.index]
    }

    pub fn is_simulated(&self) -> bool {
        self.kind() == BodyKind::Dynamic
    }

    pub fn world_transform(&self) -> Transform {
        self.view().world_transform()
    }

    /// Teleports the body. Intended for bodies that have not started simulating.
    pub fn set_world_transform(&mut self, actor_to_world: Transform) {
        self.soa.transforms[self.index] = actor_to_world.combine(&self.soa.actor_to_body[self.index]);
    }

    /// Records where a kinematic body must be at the end of the next step.
    pub fn set_kinematic_target(&mut self, actor_to_world: Transform) {
        if self.kind() != BodyKind::Kinematic {
            debug!(
                "ignoring kinematic target on {:?} body row {}",
                self.kind(),
                self.index
            );
            return;
        }
        let target = &mut self.soa.kinematic_targets[self.index];
        target.transform = actor_to_world.combine(&self.soa.actor_to_body[self.index]);
        target.is_set = true;
    }

    pub fn linear_velocity(&self) -> Vec3 {
        self.soa.velocities[self.index].linear
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.soa.velocities[self.index].linear = velocity;
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.soa.velocities[self.index].angular
    }

    pub fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.soa.velocities[self.index].angular = velocity;
    }

    pub fn linear_damping(&self) -> f32 {
        self.soa.data[self.index].linear_damping
    }

    pub fn set_linear_damping(&mut self, damping: f32) {
        self.soa.data[self.index].linear_damping = damping;
    }

    pub fn angular_damping(&self) -> f32 {
        self.soa.data[self.index].angular_damping
    }

    pub fn set_angular_damping(&mut self, damping: f32) {
        self.soa.data[self.index].angular_damping = damping;
    }

    pub fn max_linear_velocity_squared(&self) -> f32 {
        self.soa.data[self.index].max_linear_velocity_squared
    }

    pub fn set_max_linear_velocity_squared(&mut self, value: f32) {
        self.soa.data[self.index].max_linear_velocity_squared = value;
    }

    pub fn max_angular_velocity_squared(&self) -> f32 {
        self.soa.data[self.index].max_angular_velocity_squared
    }

    pub fn set_max_angular_velocity_squared(&mut self, value: f32) {
        self.soa.data[self.index].max_angular_velocity_squared = value;
    }

    pub fn inverse_mass(&self) -> f32 {
        self.soa.data[self.index].inverse_mass
    }

    pub fn set_inverse_mass(&mut self, inverse_mass: f32) {
        self.soa.data[self.index].inverse_mass = inverse_mass;
    }

    pub fn inverse_inertia(&self) -> Vec3 {
        self.soa.data[self.index].inverse_inertia
    }

    pub fn set_inverse_inertia(&mut self, inverse_inertia: Vec3) {
        self.soa.data[self.index].inverse_inertia = inverse_inertia;
    }

    pub fn max_depenetration_velocity(&self) -> f32 {
        self.soa.data[self.index].max_depenetration_velocity
    }

    pub fn set_max_depenetration_velocity(&mut self, value: f32) {
        self.soa.data[self.index].max_depenetration_velocity = value;
    }

    pub fn max_contact_impulse(&self) -> f32 {
        self.soa.data[self.index].max_contact_impulse
    }

    pub fn set_max_contact_impulse(&mut self, value: f32) {
        self.soa.data[self.index].max_contact_impulse = value;
    }

    pub fn add_force(&mut self, value: Vec3, kind: ForceKind) {
        if !self.is_simulated() {
            debug!("ignoring force on {:?} body row {}", self.kind(), self.index);
            return;
        }
        let inverse_mass = self.soa.data[self.index].inverse_mass;
        forces::accumulate(
            kind,
            value,
            inverse_mass,
            &mut self.soa.pending_accelerations[self.index],
            &mut self.soa.velocities[self.index].linear,
        );
    }

    pub fn add_radial_force(
        &mut self,
        origin: Vec3,
        strength: f32,
        radius: f32,
        falloff: RadialFalloff,
        kind: ForceKind,
    ) {
        let position = self.soa.transforms[self.index].position;
        if let Some(force) = forces::radial_force(position, origin, strength, radius, falloff) {
            self.add_force(force, kind);
        }
    }
}

/// Joint table. Rows are realigned to solver order by the batcher.
pub struct JointsSoA {
    pub(crate) slots: SlotIndex,
    pub data: Vec<JointData>,
    /// Body slots; resolved to rows when descriptors are built.
    pub body_a: Vec<u32>,
    pub body_b: Vec<Option<u32>>,
}

impl JointsSoA {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            slots: SlotIndex::new(owner),
            data: Vec::new(),
            body_a: Vec::new(),
            body_b: Vec::new(),
        }
    }

    pub fn insert(&mut self, data: JointData, body_a: u32, body_b: Option<u32>) -> u32 {
        self.data.push(data);
        self.body_a.push(body_a);
        self.body_b.push(body_b);
        let slot = self.slots.push_row();
        debug!("inserted joint (slot {}), {} joints", slot, self.len());
        slot
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.data.swap(a, b);
        self.body_a.swap(a, b);
        self.body_b.swap(a, b);
        self.slots.swap_rows(a, b);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: BodyKind, x: f32) -> BodyRow {
        BodyRow {
            kind,
            actor_to_body: Transform::IDENTITY,
            transform: Transform::from_position(Vec3::new(x, 0.0, 0.0)),
            data: RigidBodyData::fixed(),
            shapes: Vec::new(),
        }
    }

    fn assert_partitioned(soa: &BodiesSoA) {
        for (i, kind) in soa.kinds.iter().enumerate() {
            let expected = if i < soa.num_simulated() {
                BodyKind::Dynamic
            } else if i < soa.num_simulated() + soa.num_kinematic() {
                BodyKind::Kinematic
            } else {
                BodyKind::Static
            };
            assert_eq!(*kind, expected, "row {i} out of partition");
        }
    }

    #[test]
    fn dynamic_insert_cascades_through_both_partitions() {
        let mut soa = BodiesSoA::new(OwnerId::next());
        let s = soa.insert(row(BodyKind::Static, 1.0));
        let k = soa.insert(row(BodyKind::Kinematic, 2.0));
        let d = soa.insert(row(BodyKind::Dynamic, 3.0));
        assert_partitioned(&soa);

        for (slot, x) in [(s, 1.0), (k, 2.0), (d, 3.0)] {
            let index = soa.slots.row_of_slot(slot).unwrap();
            assert_eq!(soa.transforms[index].position.x, x);
        }
    }

    #[test]
    fn new_dynamic_body_activates_every_dynamic_row() {
        let mut soa = BodiesSoA::new(OwnerId::next());
        soa.insert(row(BodyKind::Dynamic, 0.0));
        soa.insert(row(BodyKind::Dynamic, 0.0));
        soa.set_num_active_simulated(1);
        soa.insert(row(BodyKind::Dynamic, 0.0));
        assert_eq!(soa.num_active_simulated(), 3);
        assert_eq!(soa.set_num_active_simulated(10), 3);
    }

    #[test]
    fn kinematic_target_ignored_on_dynamic_rows() {
        let mut soa = BodiesSoA::new(OwnerId::next());
        soa.insert(row(BodyKind::Dynamic, 0.0));
        let mut body = soa.get_mut(0).unwrap();
        body.set_kinematic_target(Transform::from_position(Vec3::ONE));
        assert!(!body.view().kinematic_target().is_set);
    }
}
