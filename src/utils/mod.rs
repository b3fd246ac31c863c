//! Utility helpers: handle allocation, per-step scratch, logging timers and math extensions.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod scratch;

pub use allocator::{BodyHandle, Handle, JointHandle};
pub use math::*;
