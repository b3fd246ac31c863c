//! Collision detection: pruning cache with persistent pair slots, and the built-in narrow phase.

pub mod clipping;
pub mod contact;
pub mod narrowphase;

pub use contact::{
    CollisionFilter, ContactBuffers, ContactCache, ContactPair, ContactPoint, FrictionPatch,
    PairCache, PairKey,
};
