//! In-memory `SessionStore` implementation.
//!
//! This is the reference backend: it holds every session in process
//! memory and implements the exact contract a durable store would.
//! Tests and the demo server run on it directly.
//!
//! # Concurrency note
//!
//! All state lives behind one `std::sync::Mutex`. None of the methods
//! hold the guard across an `.await`, so the store can be shared via
//! `Arc` by every connection handler task without deadlock risk. The
//! coordinator provides per-session ordering on top; the store itself
//! only guarantees that each individual operation is atomic.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use pointcast_protocol::{
    EstimationScale, Feature, FeatureId, Participant, ParticipantId,
    SessionId, SessionSnapshot, Vote, VoteId,
};
use rand::Rng;

use crate::{SessionStore, StoreError};

/// Default retention window for sessions, in days.
const DEFAULT_RETENTION_DAYS: i64 = 28;

/// One session's row plus the creation order of what it owns.
///
/// Insertion order is tracked explicitly because creation timestamps can
/// collide within a millisecond; the order vectors are the tiebreaker.
#[derive(Debug, Clone)]
struct SessionRow {
    id: SessionId,
    estimation_type: EstimationScale,
    created_at: DateTime<Utc>,
    participant_order: Vec<ParticipantId>,
    feature_order: Vec<FeatureId>,
}

/// A feature row without its votes (those live in their own map).
#[derive(Debug, Clone)]
struct FeatureRow {
    id: FeatureId,
    session_id: SessionId,
    name: Option<String>,
    link: Option<String>,
    is_revealed: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<SessionId, SessionRow>,
    participants: HashMap<ParticipantId, Participant>,
    features: HashMap<FeatureId, FeatureRow>,
    /// Votes per feature, in first-submission order.
    votes: HashMap<FeatureId, Vec<Vote>>,
}

impl State {
    fn assemble_feature(&self, row: &FeatureRow) -> Feature {
        Feature {
            id: row.id.clone(),
            session_id: row.session_id.clone(),
            name: row.name.clone(),
            link: row.link.clone(),
            is_revealed: row.is_revealed,
            created_at: row.created_at,
            votes: self.votes.get(&row.id).cloned().unwrap_or_default(),
        }
    }

    /// Removes a session row and everything it owns. Returns `true` if
    /// the session existed.
    fn drop_session(&mut self, session_id: &SessionId) -> bool {
        let Some(row) = self.sessions.remove(session_id) else {
            return false;
        };
        for pid in &row.participant_order {
            self.participants.remove(pid);
        }
        for fid in &row.feature_order {
            self.features.remove(fid);
            self.votes.remove(fid);
        }
        true
    }
}

/// An in-memory [`SessionStore`].
pub struct MemoryStore {
    state: Mutex<State>,
    retention: Duration,
}

impl MemoryStore {
    /// Creates an empty store with the default 28-day retention window.
    pub fn new() -> Self {
        Self::with_retention_days(DEFAULT_RETENTION_DAYS)
    }

    /// Creates an empty store with a custom retention window.
    ///
    /// Zero makes every session invalid immediately, which is how tests
    /// exercise the expired-session path without waiting 28 days.
    pub fn with_retention_days(days: i64) -> Self {
        Self {
            state: Mutex::new(State::default()),
            retention: Duration::days(days),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned mutex means a panic mid-mutation; propagating the
        // panic to every caller is the only sound option here.
        self.state.lock().expect("store mutex poisoned")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        host_name: &str,
        host_email: Option<&str>,
        estimation_type: EstimationScale,
    ) -> Result<(SessionId, ParticipantId), StoreError> {
        let session_id = SessionId(generate_id());
        let host_id = ParticipantId(generate_id());
        let now = Utc::now();

        let host = Participant {
            id: host_id.clone(),
            session_id: session_id.clone(),
            name: host_name.to_owned(),
            email: host_email.map(str::to_owned),
            is_host: true,
            created_at: now,
        };

        let mut state = self.lock();
        state.sessions.insert(
            session_id.clone(),
            SessionRow {
                id: session_id.clone(),
                estimation_type,
                created_at: now,
                participant_order: vec![host_id.clone()],
                feature_order: Vec::new(),
            },
        );
        state.participants.insert(host_id.clone(), host);

        tracing::info!(%session_id, host = %host_name, "session created");
        Ok((session_id, host_id))
    }

    async fn join_session(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
        name: &str,
        email: Option<&str>,
    ) -> Result<Participant, StoreError> {
        let mut state = self.lock();

        // Same id joining again is the same person (page refresh or a
        // rejoin after a drop) — hand back the existing record.
        if let Some(existing) = state.participants.get(participant_id) {
            return Ok(existing.clone());
        }

        if !state.sessions.contains_key(session_id) {
            return Err(StoreError::SessionNotFound(session_id.clone()));
        }

        let participant = Participant {
            id: participant_id.clone(),
            session_id: session_id.clone(),
            name: name.to_owned(),
            email: email.map(str::to_owned),
            is_host: false,
            created_at: Utc::now(),
        };
        state
            .participants
            .insert(participant_id.clone(), participant.clone());
        state
            .sessions
            .get_mut(session_id)
            .expect("checked above")
            .participant_order
            .push(participant_id.clone());

        tracing::info!(%session_id, %participant_id, "participant joined");
        Ok(participant)
    }

    async fn is_session_valid(
        &self,
        session_id: &SessionId,
    ) -> Result<bool, StoreError> {
        let cutoff = Utc::now() - self.retention;
        let state = self.lock();
        Ok(state
            .sessions
            .get(session_id)
            .is_some_and(|row| row.created_at >= cutoff))
    }

    async fn is_host(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> Result<bool, StoreError> {
        let state = self.lock();
        Ok(state.participants.get(participant_id).is_some_and(|p| {
            p.is_host && &p.session_id == session_id
        }))
    }

    async fn get_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> Result<Option<Participant>, StoreError> {
        Ok(self.lock().participants.get(participant_id).cloned())
    }

    async fn participant_exists_in_session(
        &self,
        participant_id: &ParticipantId,
        session_id: &SessionId,
    ) -> Result<bool, StoreError> {
        let state = self.lock();
        Ok(state
            .participants
            .get(participant_id)
            .is_some_and(|p| &p.session_id == session_id))
    }

    async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionSnapshot>, StoreError> {
        let state = self.lock();
        let Some(row) = state.sessions.get(session_id) else {
            return Ok(None);
        };

        let participants = row
            .participant_order
            .iter()
            .filter_map(|pid| state.participants.get(pid).cloned())
            .collect();
        let features: Vec<Feature> = row
            .feature_order
            .iter()
            .filter_map(|fid| state.features.get(fid))
            .map(|f| state.assemble_feature(f))
            .collect();

        // Current = newest unrevealed; if everything is revealed, the
        // newest feature is shown as current but can't be voted on.
        let current_feature = features
            .iter()
            .rev()
            .find(|f| !f.is_revealed)
            .or(features.last())
            .cloned();

        Ok(Some(SessionSnapshot {
            session: pointcast_protocol::Session {
                id: row.id.clone(),
                estimation_type: row.estimation_type,
                created_at: row.created_at,
                participants,
                features,
            },
            current_feature,
        }))
    }

    async fn create_feature(
        &self,
        session_id: &SessionId,
        name: Option<&str>,
        link: Option<&str>,
    ) -> Result<Feature, StoreError> {
        let mut state = self.lock();
        if !state.sessions.contains_key(session_id) {
            return Err(StoreError::SessionNotFound(session_id.clone()));
        }

        let row = FeatureRow {
            id: FeatureId(generate_id()),
            session_id: session_id.clone(),
            name: name.map(str::to_owned),
            link: link.map(str::to_owned),
            is_revealed: false,
            created_at: Utc::now(),
        };
        let feature = state.assemble_feature(&row);

        state
            .sessions
            .get_mut(session_id)
            .expect("checked above")
            .feature_order
            .push(row.id.clone());
        tracing::info!(%session_id, feature_id = %row.id, "feature created");
        state.features.insert(row.id.clone(), row);

        Ok(feature)
    }

    async fn submit_vote(
        &self,
        feature_id: &FeatureId,
        participant_id: &ParticipantId,
        value: &str,
    ) -> Result<Vote, StoreError> {
        let mut state = self.lock();
        if !state.features.contains_key(feature_id) {
            return Err(StoreError::FeatureNotFound(feature_id.clone()));
        }

        let votes = state.votes.entry(feature_id.clone()).or_default();
        if let Some(existing) = votes
            .iter_mut()
            .find(|v| &v.participant_id == participant_id)
        {
            existing.value = value.to_owned();
            return Ok(existing.clone());
        }

        let vote = Vote {
            id: VoteId(generate_id()),
            feature_id: feature_id.clone(),
            participant_id: participant_id.clone(),
            value: value.to_owned(),
        };
        votes.push(vote.clone());
        Ok(vote)
    }

    async fn delete_vote(
        &self,
        feature_id: &FeatureId,
        participant_id: &ParticipantId,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        if let Some(votes) = state.votes.get_mut(feature_id) {
            votes.retain(|v| &v.participant_id != participant_id);
        }
        Ok(())
    }

    async fn reveal_results(
        &self,
        feature_id: &FeatureId,
    ) -> Result<Feature, StoreError> {
        let mut state = self.lock();
        let row = state
            .features
            .get_mut(feature_id)
            .ok_or_else(|| StoreError::FeatureNotFound(feature_id.clone()))?;
        row.is_revealed = true;
        let row = row.clone();
        tracing::info!(%feature_id, "results revealed");
        Ok(state.assemble_feature(&row))
    }

    async fn check_consensus(
        &self,
        feature_id: &FeatureId,
    ) -> Result<bool, StoreError> {
        let state = self.lock();
        let values: Vec<&str> = state
            .votes
            .get(feature_id)
            .map(|votes| {
                votes
                    .iter()
                    .map(|v| v.value.as_str())
                    .filter(|v| !pointcast_protocol::is_sentinel(v))
                    .collect()
            })
            .unwrap_or_default();

        let Some(first) = values.first() else {
            return Ok(false);
        };
        Ok(values.iter().all(|v| v == first))
    }

    async fn delete_session(
        &self,
        session_id: &SessionId,
    ) -> Result<bool, StoreError> {
        let deleted = self.lock().drop_session(session_id);
        if deleted {
            tracing::info!(%session_id, "session deleted");
        }
        Ok(deleted)
    }

    async fn remove_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(participant) = state.participants.remove(participant_id)
        else {
            return Ok(false);
        };

        if let Some(row) = state.sessions.get_mut(&participant.session_id) {
            row.participant_order.retain(|pid| pid != participant_id);
            // Their votes go with them.
            let feature_ids = row.feature_order.clone();
            for fid in feature_ids {
                if let Some(votes) = state.votes.get_mut(&fid) {
                    votes.retain(|v| &v.participant_id != participant_id);
                }
            }
        }

        tracing::info!(%participant_id, "participant removed");
        Ok(true)
    }

    async fn delete_old_sessions(
        &self,
        older_than_days: i64,
    ) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - Duration::days(older_than_days);
        let mut state = self.lock();
        let old: Vec<SessionId> = state
            .sessions
            .values()
            .filter(|row| row.created_at < cutoff)
            .map(|row| row.id.clone())
            .collect();
        for session_id in &old {
            state.drop_session(session_id);
        }
        if !old.is_empty() {
            tracing::info!(count = old.len(), "old sessions purged");
        }
        Ok(old.len())
    }
}

/// Symbol set for generated ids (nanoid-compatible, URL-safe).
const ID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Generates a random 21-character id, matching the id shape clients
/// already generate for themselves.
fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..21)
        .map(|_| {
            let idx = rng.random_range(0..ID_ALPHABET.len());
            ID_ALPHABET[idx] as char
        })
        .collect()
}

// =========================================================================
// Tests
// =========================================================================
