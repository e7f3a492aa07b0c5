//! The `SessionStore` trait — the seam between the coordination core and
//! whatever persists session data.
//!
//! The coordinator consumes exactly this interface; it never assumes an
//! in-memory backend. That keeps the real-time core testable with a fake
//! store (including one that fails on demand) and leaves room for a
//! durable implementation without touching the coordinator.

use std::future::Future;

use pointcast_protocol::{
    EstimationScale, Feature, FeatureId, Participant, ParticipantId,
    SessionId, SessionSnapshot, Vote,
};

use crate::StoreError;

/// Durable record of sessions, participants, features, and votes.
///
/// # Trait bounds
///
/// Methods return `impl Future + Send` (rather than plain `async fn`)
/// because the coordinator awaits them inside spawned tasks — the
/// departure drain and every connection handler — and Tokio requires
/// those futures to be `Send`. Implementations can still use `async fn`.
///
/// # Contract notes
///
/// - `join_session` is idempotent per participant id: joining again with
///   an id that already exists returns the existing record unchanged.
/// - `submit_vote` upserts: at most one vote per (feature, participant),
///   last write wins.
/// - `delete_vote` of an absent vote is a no-op, not an error.
/// - `reveal_results` is idempotent; a feature's revealed flag never
///   reverts to false.
/// - `delete_session` cascades to participants, features, and votes.
pub trait SessionStore: Send + Sync + 'static {
    /// Creates a session and its host participant atomically.
    ///
    /// Returns the generated session id and host participant id. The
    /// host is the only participant with the host flag, for the life of
    /// the session.
    fn create_session(
        &self,
        host_name: &str,
        host_email: Option<&str>,
        estimation_type: EstimationScale,
    ) -> impl Future<Output = Result<(SessionId, ParticipantId), StoreError>> + Send;

    /// Registers a participant in a session.
    ///
    /// The participant id is client-generated (persisted client-side so
    /// reconnects reuse it). If the id already exists the existing
    /// record is returned and nothing is written.
    ///
    /// # Errors
    /// [`StoreError::SessionNotFound`] if the session doesn't exist.
    fn join_session(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
        name: &str,
        email: Option<&str>,
    ) -> impl Future<Output = Result<Participant, StoreError>> + Send;

    /// Returns `true` if the session exists and is within the retention
    /// window.
    fn is_session_valid(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns `true` if the participant is the host of the session.
    ///
    /// Unknown session or participant is simply `false`.
    fn is_host(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Looks up a participant by id.
    fn get_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> impl Future<Output = Result<Option<Participant>, StoreError>> + Send;

    /// Returns `true` if the participant is a member of the session.
    fn participant_exists_in_session(
        &self,
        participant_id: &ParticipantId,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns the full session snapshot (participants, features with
    /// votes, current feature), or `None` if the session doesn't exist.
    fn get_session(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionSnapshot>, StoreError>> + Send;

    /// Creates a new, unrevealed feature with no votes.
    ///
    /// # Errors
    /// [`StoreError::SessionNotFound`] if the session doesn't exist.
    fn create_feature(
        &self,
        session_id: &SessionId,
        name: Option<&str>,
        link: Option<&str>,
    ) -> impl Future<Output = Result<Feature, StoreError>> + Send;

    /// Creates or overwrites the vote for (feature, participant).
    ///
    /// # Errors
    /// [`StoreError::FeatureNotFound`] if the feature doesn't exist.
    fn submit_vote(
        &self,
        feature_id: &FeatureId,
        participant_id: &ParticipantId,
        value: &str,
    ) -> impl Future<Output = Result<Vote, StoreError>> + Send;

    /// Deletes the vote for (feature, participant) if present.
    fn delete_vote(
        &self,
        feature_id: &FeatureId,
        participant_id: &ParticipantId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Marks the feature revealed and returns it with all its votes.
    /// Idempotent.
    ///
    /// # Errors
    /// [`StoreError::FeatureNotFound`] if the feature doesn't exist.
    fn reveal_results(
        &self,
        feature_id: &FeatureId,
    ) -> impl Future<Output = Result<Feature, StoreError>> + Send;

    /// Computes consensus over the feature's current votes.
    ///
    /// Sentinel values are excluded; consensus holds iff at least one
    /// non-sentinel vote exists and all non-sentinel values are equal.
    fn check_consensus(
        &self,
        feature_id: &FeatureId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Deletes a session and everything it owns. Returns `false` if the
    /// session didn't exist.
    fn delete_session(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Removes a participant record (and their votes). Returns `false`
    /// if the participant didn't exist.
    fn remove_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Bulk-deletes sessions older than the given number of days.
    /// Returns how many sessions were removed.
    fn delete_old_sessions(
        &self,
        older_than_days: i64,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// A shared store is a store.
///
/// The same backing store is typically owned by several consumers at
/// once — the real-time coordinator plus whatever pre-registers
/// sessions and participants (a REST layer, a seed script, a test).
/// Delegating through `Arc` lets them all hold it.
impl<S: SessionStore> SessionStore for std::sync::Arc<S> {
    fn create_session(
        &self,
        host_name: &str,
        host_email: Option<&str>,
        estimation_type: EstimationScale,
    ) -> impl Future<Output = Result<(SessionId, ParticipantId), StoreError>> + Send
    {
        (**self).create_session(host_name, host_email, estimation_type)
    }

    fn join_session(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
        name: &str,
        email: Option<&str>,
    ) -> impl Future<Output = Result<Participant, StoreError>> + Send {
        (**self).join_session(session_id, participant_id, name, email)
    }

    fn is_session_valid(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        (**self).is_session_valid(session_id)
    }

    fn is_host(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        (**self).is_host(session_id, participant_id)
    }

    fn get_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> impl Future<Output = Result<Option<Participant>, StoreError>> + Send
    {
        (**self).get_participant(participant_id)
    }

    fn participant_exists_in_session(
        &self,
        participant_id: &ParticipantId,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        (**self).participant_exists_in_session(participant_id, session_id)
    }

    fn get_session(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionSnapshot>, StoreError>> + Send
    {
        (**self).get_session(session_id)
    }

    fn create_feature(
        &self,
        session_id: &SessionId,
        name: Option<&str>,
        link: Option<&str>,
    ) -> impl Future<Output = Result<Feature, StoreError>> + Send {
        (**self).create_feature(session_id, name, link)
    }

    fn submit_vote(
        &self,
        feature_id: &FeatureId,
        participant_id: &ParticipantId,
        value: &str,
    ) -> impl Future<Output = Result<Vote, StoreError>> + Send {
        (**self).submit_vote(feature_id, participant_id, value)
    }

    fn delete_vote(
        &self,
        feature_id: &FeatureId,
        participant_id: &ParticipantId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).delete_vote(feature_id, participant_id)
    }

    fn reveal_results(
        &self,
        feature_id: &FeatureId,
    ) -> impl Future<Output = Result<Feature, StoreError>> + Send {
        (**self).reveal_results(feature_id)
    }

    fn check_consensus(
        &self,
        feature_id: &FeatureId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        (**self).check_consensus(feature_id)
    }

    fn delete_session(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        (**self).delete_session(session_id)
    }

    fn remove_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        (**self).remove_participant(participant_id)
    }

    fn delete_old_sessions(
        &self,
        older_than_days: i64,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send {
        (**self).delete_old_sessions(older_than_days)
    }
}
