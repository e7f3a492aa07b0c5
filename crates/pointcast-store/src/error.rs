//! Error types for the store layer.

use pointcast_protocol::{FeatureId, ParticipantId, SessionId};

/// Errors that can occur during store operations.
///
/// Lookups that may legitimately miss return `Ok(None)` / `Ok(false)`
/// instead of erroring; these variants are for operations whose target
/// must exist (e.g. voting on a feature).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The session does not exist.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The feature does not exist.
    #[error("feature {0} not found")]
    FeatureNotFound(FeatureId),

    /// The participant does not exist.
    #[error("participant {0} not found")]
    ParticipantNotFound(ParticipantId),

    /// The backing storage failed. Never produced by the in-memory
    /// store; durable implementations surface I/O and query failures
    /// through this variant.
    #[error("storage backend failure: {0}")]
    Backend(String),
}
