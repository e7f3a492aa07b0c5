//! Binding types: what the registry knows about a participant's presence.

use std::time::Duration;

use pointcast_protocol::{ParticipantId, SessionId};
use pointcast_transport::ConnectionId;

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Configuration for connection-registry behavior.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long a dropped connection may stay dark before the registry
    /// treats the participant as gone and emits a [`Departure`].
    ///
    /// Default: 3 seconds — long enough for a page refresh, short
    /// enough that the room notices a real departure promptly.
    pub grace_period: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(3),
        }
    }
}

// ---------------------------------------------------------------------------
// BindOutcome
// ---------------------------------------------------------------------------

/// What [`bind`](crate::ConnectionRegistry::bind) found when it recorded
/// a connection.
///
/// `reconnect` decides whether the coordinator announces the participant
/// to the room: a reconnect within the grace window is invisible to the
/// other participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOutcome {
    /// `true` iff a grace timer was pending for this participant and
    /// this bind cancelled it.
    pub reconnect: bool,

    /// The connection this bind displaced, if the participant was
    /// already bound (extra tab, or a rebind racing the old socket's
    /// close). The displaced connection no longer speaks for anyone.
    pub replaced: Option<ConnectionId>,
}

// ---------------------------------------------------------------------------
// Departure
// ---------------------------------------------------------------------------

/// Emitted to the coordinator when a grace timer fires.
///
/// Carries the generation of the disconnect cycle that armed the timer;
/// the coordinator hands it back to
/// [`take_departed`](crate::ConnectionRegistry::take_departed), which
/// drops departures whose cycle lost a race against a rebind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub participant_id: ParticipantId,
    pub session_id: SessionId,
    pub generation: u64,
}
