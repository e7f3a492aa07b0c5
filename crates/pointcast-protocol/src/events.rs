//! The real-time event contract between clients and the coordinator.
//!
//! Every frame on the wire is `{"event": "<name>", "data": {...}}`.
//! Event names are kebab-case and payload fields are camelCase; both are
//! part of the client contract and must not drift.
//!
//! [`ClientEvent`] is what clients send; [`ServerEvent`] is what the
//! coordinator unicasts or broadcasts back. The two directions are
//! separate enums on purpose: the server never decodes its own output,
//! and clients can never inject a server-side event.

use serde::{Deserialize, Serialize};

use crate::{
    Feature, FeatureId, Participant, ParticipantId, SessionId,
    SessionSnapshot,
};

// ---------------------------------------------------------------------------
// ClientEvent — inbound actions
// ---------------------------------------------------------------------------

/// An action a client sends to the coordinator.
///
/// Every action names the session it targets and the participant issuing
/// it; the coordinator validates both before touching any state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Bind this connection to a session the participant already joined
    /// through the join endpoint.
    #[serde(rename_all = "camelCase")]
    JoinSession {
        session_id: SessionId,
        participant_id: ParticipantId,
    },

    /// Submit (or overwrite) a vote on a feature.
    #[serde(rename_all = "camelCase")]
    SubmitVote {
        session_id: SessionId,
        feature_id: FeatureId,
        participant_id: ParticipantId,
        value: String,
    },

    /// Withdraw a previously submitted vote.
    #[serde(rename_all = "camelCase")]
    UnsubmitVote {
        session_id: SessionId,
        feature_id: FeatureId,
        participant_id: ParticipantId,
    },

    /// Start a new feature for estimation. Host only.
    ///
    /// `name` and `link` default when absent: clients drop undefined
    /// keys entirely instead of sending `null`.
    #[serde(rename_all = "camelCase")]
    StartFeature {
        session_id: SessionId,
        participant_id: ParticipantId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        link: Option<String>,
    },

    /// Reveal a feature's votes to everyone. Host only.
    #[serde(rename_all = "camelCase")]
    RevealResults {
        session_id: SessionId,
        feature_id: FeatureId,
        participant_id: ParticipantId,
    },

    /// Close the session and delete its data. Host only.
    #[serde(rename_all = "camelCase")]
    CloseSession {
        session_id: SessionId,
        participant_id: ParticipantId,
    },
}

impl ClientEvent {
    /// The session this action targets.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::JoinSession { session_id, .. }
            | Self::SubmitVote { session_id, .. }
            | Self::UnsubmitVote { session_id, .. }
            | Self::StartFeature { session_id, .. }
            | Self::RevealResults { session_id, .. }
            | Self::CloseSession { session_id, .. } => session_id,
        }
    }

    /// The participant issuing this action.
    pub fn participant_id(&self) -> &ParticipantId {
        match self {
            Self::JoinSession { participant_id, .. }
            | Self::SubmitVote { participant_id, .. }
            | Self::UnsubmitVote { participant_id, .. }
            | Self::StartFeature { participant_id, .. }
            | Self::RevealResults { participant_id, .. }
            | Self::CloseSession { participant_id, .. } => participant_id,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerEvent — outbound events
// ---------------------------------------------------------------------------

/// An event the coordinator sends to one connection or fans out to a
/// session room.
///
/// Note on `VoteSubmitted`: the raw value travels with the broadcast even
/// before the feature is revealed. Hiding unrevealed votes is a UI
/// concern, not a protocol boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Unicast rejection or failure notice.
    Error { message: String },

    /// Full current-state snapshot, unicast to a joining connection.
    SessionUpdated(SessionSnapshot),

    /// A participant came online in the room.
    ParticipantJoined { participant: Participant },

    /// A participant's disconnect grace period expired.
    #[serde(rename_all = "camelCase")]
    ParticipantLeft { participant_id: ParticipantId },

    /// The host's disconnect grace period expired. The session stays
    /// open (and host-less) until the host returns or someone closes it.
    HostDisconnected {},

    /// A vote was submitted or overwritten.
    #[serde(rename_all = "camelCase")]
    VoteSubmitted {
        feature_id: FeatureId,
        participant_id: ParticipantId,
        value: String,
    },

    /// A vote was withdrawn.
    #[serde(rename_all = "camelCase")]
    VoteUnsubmitted {
        feature_id: FeatureId,
        participant_id: ParticipantId,
    },

    /// The host started a new feature; it is now the current one.
    FeatureStarted { feature: Feature },

    /// The host revealed a feature's votes.
    #[serde(rename_all = "camelCase")]
    ResultsRevealed {
        feature: Feature,
        has_consensus: bool,
    },

    /// The host closed the session; clients should leave.
    #[serde(rename_all = "camelCase")]
    SessionClosed { session_id: SessionId },
}

// =========================================================================
// Tests
// =========================================================================
