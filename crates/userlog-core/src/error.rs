//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The caller supplied an invalid parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A lookup by id or name yielded nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// An underlying store I/O failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A broker send or event serialization failure.
    #[error("publish error: {0}")]
    Publish(String),

    /// An event type outside the closed set of known types.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A payload that could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A full rebuild aborted part way through.
    #[error("rebuild aborted after {applied} events: {reason}")]
    Rebuild {
        /// Number of events applied before the failure.
        applied: usize,
        /// The failure that aborted the rebuild.
        reason: String,
    },
}

impl DomainError {
    /// Returns `true` for failures worth retrying (store and broker I/O).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Publish(_))
    }
}
