//! Configuration constants and runtime settings for the Ragdoll Accelerator solver.

use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// Largest step the simulation will take; longer frames are clamped.
pub const DEFAULT_MAX_DT: f32 = 0.033;

/// Separation below which the narrow phase still reports contact points (metres).
pub const DEFAULT_CONTACT_DISTANCE: f32 = 0.01;

/// Approach speed above which restitution is applied (m/s).
pub const DEFAULT_BOUNCE_THRESHOLD: f32 = 2.0;

/// Drift allowed between a pair's cached friction anchors before they are dropped (metres).
pub const DEFAULT_FRICTION_ANCHOR_TOLERANCE: f32 = 0.02;

pub const DEFAULT_LINEAR_DAMPING: f32 = 0.0;
pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.05;
pub const DEFAULT_MAX_LINEAR_VELOCITY: f32 = 1.0e3;
pub const DEFAULT_MAX_ANGULAR_VELOCITY: f32 = 100.0;
pub const DEFAULT_MAX_DEPENETRATION_VELOCITY: f32 = 5.0;
pub const DEFAULT_MAX_CONTACT_IMPULSE: f32 = f32::MAX;

pub const DEFAULT_POSITION_ITERATIONS: u32 = 8;
pub const DEFAULT_VELOCITY_ITERATIONS: u32 = 1;

/// Fraction of positional error fed back per position iteration.
pub const DEFAULT_BIAS_FACTOR: f32 = 0.8;

/// Settings fixed for the lifetime of a [`Simulation`](crate::Simulation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Keep per-pair manifolds and friction anchors across consecutive steps.
    pub persistent_contacts: bool,
    /// Group joints into solver batches; otherwise each joint is its own batch.
    pub batch_joints: bool,
    pub max_dt: f32,
    pub contact_distance: f32,
    pub bounce_threshold: f32,
    pub friction_anchor_tolerance: f32,
    /// Run solver-body construction and integration on the rayon pool.
    pub parallel: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            persistent_contacts: false,
            batch_joints: true,
            max_dt: DEFAULT_MAX_DT,
            contact_distance: DEFAULT_CONTACT_DISTANCE,
            bounce_threshold: DEFAULT_BOUNCE_THRESHOLD,
            friction_anchor_tolerance: DEFAULT_FRICTION_ANCHOR_TOLERANCE,
            parallel: false,
        }
    }
}

impl SimulationConfig {
    pub fn with_persistent_contacts(mut self, enabled: bool) -> Self {
        self.persistent_contacts = enabled;
        self
    }

    pub fn with_joint_batching(mut self, enabled: bool) -> Self {
        self.batch_joints = enabled;
        self
    }

    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !(self.max_dt > 0.0) || !self.max_dt.is_finite() {
            return Err(PhysicsError::InvalidConfig(format!(
                "max_dt must be positive and finite, got {}",
                self.max_dt
            )));
        }
        if self.contact_distance < 0.0 || !self.contact_distance.is_finite() {
            return Err(PhysicsError::InvalidConfig(format!(
                "contact_distance must be non-negative, got {}",
                self.contact_distance
            )));
        }
        if self.bounce_threshold < 0.0 {
            return Err(PhysicsError::InvalidConfig(format!(
                "bounce_threshold must be non-negative, got {}",
                self.bounce_threshold
            )));
        }
        if self.friction_anchor_tolerance < 0.0 {
            return Err(PhysicsError::InvalidConfig(format!(
                "friction_anchor_tolerance must be non-negative, got {}",
                self.friction_anchor_tolerance
            )));
        }
        Ok(())
    }
}
