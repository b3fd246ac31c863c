use thiserror::Error;

/// Failures surfaced by the public simulation API.
///
/// Most invalid inputs are structural no-ops; only misuse that would otherwise
/// touch the wrong table row is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhysicsError {
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),
    #[error("handle was issued by a different simulation")]
    ForeignHandle,
    #[error("handle does not reference a live row")]
    StaleHandle,
}
