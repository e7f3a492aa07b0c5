//! Core data model for Pointcast's wire format.
//!
//! Everything here travels on the wire: these records are serialized to
//! JSON, broadcast to every client in a session room, and rendered by the
//! UI. Field names are camelCase on the wire (the client contract), so
//! every struct carries `#[serde(rename_all = "camelCase")]`.

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for an estimation session.
///
/// Ids are opaque strings (server-generated, nanoid-style). The newtype
/// wrapper keeps a `SessionId` from being confused with the other string
/// ids in function signatures and map keys.
///
/// `#[serde(transparent)]` serializes the wrapper as the bare string, so a
/// `SessionId` is just `"V1StGXR8_Z5jdHi6B-myT"` in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a participant.
///
/// Generated client-side and persisted in the client's local storage, so
/// the same participant id shows up again after a page refresh — that is
/// what makes reconnect detection possible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a feature (a work item being estimated).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub String);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a single vote row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteId(pub String);

impl fmt::Display for VoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Estimation scale
// ---------------------------------------------------------------------------

/// Sentinel vote values accepted on every scale.
///
/// `"?"` means "I don't know", `"☕"` means "I need a break / pass".
/// Sentinels are excluded from consensus computation.
pub const SENTINEL_VALUES: [&str; 2] = ["?", "☕"];

/// Returns `true` if `value` is one of the sentinel vote values.
pub fn is_sentinel(value: &str) -> bool {
    SENTINEL_VALUES.contains(&value)
}

/// The set of cards a session estimates with.
///
/// Serialized uppercase (`"FIBONACCI"` / `"TSHIRT"`) to match the client
/// contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum EstimationScale {
    /// Fibonacci-ish story points: 0, 1, 2, 3, 5, 8, 13, 21.
    #[default]
    Fibonacci,
    /// T-shirt sizes: XS through XXL.
    Tshirt,
}

impl EstimationScale {
    /// The card values for this scale, sentinels excluded.
    pub fn values(&self) -> &'static [&'static str] {
        match self {
            Self::Fibonacci => {
                &["0", "1", "2", "3", "5", "8", "13", "21"]
            }
            Self::Tshirt => &["XS", "S", "M", "L", "XL", "XXL"],
        }
    }

    /// Returns `true` if `value` is a legal vote on this scale
    /// (a card value or a sentinel).
    pub fn allows(&self, value: &str) -> bool {
        is_sentinel(value) || self.values().contains(&value)
    }
}

impl fmt::Display for EstimationScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fibonacci => write!(f, "FIBONACCI"),
            Self::Tshirt => write!(f, "TSHIRT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One person in an estimation session.
///
/// Exactly one participant per session carries `is_host: true`, assigned
/// at session creation and never reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub session_id: SessionId,
    pub name: String,
    /// Only used for avatar derivation on the client; never validated.
    pub email: Option<String>,
    pub is_host: bool,
    pub created_at: DateTime<Utc>,
}

/// One participant's estimate for one feature.
///
/// At most one vote exists per (feature, participant) pair; resubmitting
/// overwrites the value in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: VoteId,
    pub feature_id: FeatureId,
    pub participant_id: ParticipantId,
    pub value: String,
}

/// A work item being estimated within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: FeatureId,
    pub session_id: SessionId,
    pub name: Option<String>,
    pub link: Option<String>,
    /// Monotonic: flips false → true on reveal and never reverts.
    pub is_revealed: bool,
    pub created_at: DateTime<Utc>,
    pub votes: Vec<Vote>,
}

/// A full session record with its participants and features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub estimation_type: EstimationScale,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<Participant>,
    /// Ordered by creation time, oldest first.
    pub features: Vec<Feature>,
}

/// The full-state payload unicast to a joining connection.
///
/// `current_feature` is the most recently created unrevealed feature; if
/// every feature is revealed, the most recently created one (shown as
/// current, but immutable for voting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: Session,
    pub current_feature: Option<Feature>,
}

// =========================================================================
// Tests
// =========================================================================
