//! Per-step scratch storage.
//!
//! Buffers are plain `Vec`s that keep their capacity between steps, so a
//! warmed-up simulation does not allocate while stepping.

use crate::collision::contact::ContactBuffers;
use crate::dynamics::backend::{
    ConstraintBatch, ConstraintDescriptor, ConstraintRow, MotionDelta, SolverBody,
    SolverConstraints,
};

/// Storage that can be emptied for reuse without giving back its capacity.
pub trait Reset {
    fn reset(&mut self);
}

impl<T> Reset for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl Reset for ContactBuffers {
    fn reset(&mut self) {
        self.clear();
    }
}

impl Reset for SolverConstraints {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Two instances of `T`, one written this step and one left from the previous step.
///
/// With double buffering off, the same instance is reset and rewritten every step.
#[derive(Debug, Default)]
pub struct DoubleBuffered<T> {
    buffers: [T; 2],
    current: usize,
    enabled: bool,
}

impl<T: Default + Reset> DoubleBuffered<T> {
    pub fn new(enabled: bool) -> Self {
        Self {
            buffers: [T::default(), T::default()],
            current: 0,
            enabled,
        }
    }

    pub fn is_double_buffered(&self) -> bool {
        self.enabled
    }

    /// Makes the other buffer current (when enabled) and resets it.
    pub fn begin_step(&mut self) {
        if self.enabled {
            self.current ^= 1;
        }
        self.buffers[self.current].reset();
    }

    pub fn current(&self) -> &T {
        &self.buffers[self.current]
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.buffers[self.current]
    }

    /// Data written during the previous step, if double buffering is on.
    pub fn previous(&self) -> Option<&T> {
        self.enabled.then(|| &self.buffers[self.current ^ 1])
    }
}

/// Linear scratch reset at the start of every step.
#[derive(Debug, Default)]
pub struct StepScratch {
    pub solver_bodies: Vec<SolverBody>,
    pub motion_deltas: Vec<MotionDelta>,
    pub contact_descriptors: Vec<ConstraintDescriptor>,
    /// Contact descriptors in batch order.
    pub ordered_contacts: Vec<ConstraintDescriptor>,
    /// Joint batches followed by contact batches, indexing prepared blocks.
    pub batches: Vec<ConstraintBatch>,
    pub joint_rows: Vec<ConstraintRow>,
}

impl StepScratch {
    pub fn reset(&mut self) {
        self.solver_bodies.clear();
        self.motion_deltas.clear();
        self.contact_descriptors.clear();
        self.ordered_contacts.clear();
        self.batches.clear();
        self.joint_rows.clear();
    }
}
