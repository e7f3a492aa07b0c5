//! The connection registry: participant ↔ connection bindings and the
//! disconnect grace-period state machine.
//!
//! ## Presence lifecycle
//!
//! ```text
//! bind() ──→ [Bound] ──connection_closed()──→ [GracePending]
//!               ↑                                  │     │
//!               └──────────── bind() ──────────────┘     │ timer fires
//!                        (reconnect, timer                ▼
//!                         cancelled)              Departure emitted,
//!                                                 binding discarded
//! ```
//!
//! Timers are real scheduled tasks, not a polling sweep: each
//! `connection_closed` arms one abortable `tokio::time::sleep` task, and
//! a rebind aborts it. Exactly one departure can be consumed per
//! disconnect cycle — the generation number makes a timer that fired
//! concurrently with a rebind detectable, so a stale departure is
//! dropped instead of ghosting a live participant out of the room.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is not thread-safe by itself — it uses plain
//! `HashMap`s and is meant to live behind the coordinator's mutex. The
//! only thing that escapes that mutex is the departure channel, which
//! the timer tasks write and the coordinator's drain task reads.

use std::collections::HashMap;

use pointcast_protocol::{ParticipantId, SessionId};
use pointcast_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{BindOutcome, Departure, RegistryConfig};

/// The lifecycle state of one participant's binding.
#[derive(Debug)]
enum BindingState {
    /// The connection is live.
    Bound,

    /// The connection dropped; the grace timer for cycle `generation`
    /// is armed and `timer` will emit a [`Departure`] unless aborted.
    GracePending {
        generation: u64,
        timer: JoinHandle<()>,
    },
}

/// One participant's presence record.
#[derive(Debug)]
struct Binding {
    session_id: SessionId,
    conn_id: ConnectionId,
    state: BindingState,
}

/// Tracks which connection speaks for which participant, per process.
///
/// Invariants:
/// - at most one binding per participant id (newest connection wins)
/// - at most one armed grace timer per participant id
/// - each disconnect cycle yields at most one consumable departure
pub struct ConnectionRegistry {
    bindings: HashMap<ParticipantId, Binding>,
    /// Reverse index so a transport-level close (which only knows the
    /// connection id) finds its participant without a scan.
    by_connection: HashMap<ConnectionId, ParticipantId>,
    config: RegistryConfig,
    departures: mpsc::UnboundedSender<Departure>,
    /// Monotonic disconnect-cycle counter shared by all participants.
    next_generation: u64,
}

impl ConnectionRegistry {
    /// Creates a registry and the channel its grace timers emit on.
    ///
    /// The receiver goes to the coordinator's departure-drain task.
    pub fn new(
        config: RegistryConfig,
    ) -> (Self, mpsc::UnboundedReceiver<Departure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                bindings: HashMap::new(),
                by_connection: HashMap::new(),
                config,
                departures: tx,
                next_generation: 0,
            },
            rx,
        )
    }

    /// Records `conn_id` as the participant's active connection.
    ///
    /// If a grace timer is pending for this participant it is cancelled
    /// and the outcome reports `reconnect: true` — the caller should
    /// skip the joined announcement. If the participant was already
    /// bound to a different live connection (extra tab), the old
    /// connection is displaced and reported in `replaced`.
    pub fn bind(
        &mut self,
        participant_id: &ParticipantId,
        session_id: &SessionId,
        conn_id: ConnectionId,
    ) -> BindOutcome {
        let mut outcome = BindOutcome {
            reconnect: false,
            replaced: None,
        };

        if let Some(old) = self.bindings.remove(participant_id) {
            self.by_connection.remove(&old.conn_id);
            match old.state {
                BindingState::Bound => {
                    if old.conn_id != conn_id {
                        outcome.replaced = Some(old.conn_id);
                    }
                }
                BindingState::GracePending { timer, .. } => {
                    timer.abort();
                    outcome.reconnect = true;
                    // The dead connection is displaced too, so the
                    // caller can drop its room membership.
                    if old.conn_id != conn_id {
                        outcome.replaced = Some(old.conn_id);
                    }
                    tracing::info!(
                        %participant_id,
                        %session_id,
                        "participant reconnected within grace period"
                    );
                }
            }
        }

        self.bindings.insert(
            participant_id.clone(),
            Binding {
                session_id: session_id.clone(),
                conn_id,
                state: BindingState::Bound,
            },
        );
        self.by_connection
            .insert(conn_id, participant_id.clone());

        outcome
    }

    /// Reacts to a transport-level connection close.
    ///
    /// Arms the grace timer iff the closed connection is still the
    /// participant's current one. A connection that was already
    /// displaced by a rebind closes silently — its participant is alive
    /// on the newer connection.
    pub fn connection_closed(&mut self, conn_id: ConnectionId) {
        let Some(participant_id) = self.by_connection.remove(&conn_id)
        else {
            // Connection never bound (or already displaced): nothing to do.
            return;
        };
        let Some(binding) = self.bindings.get_mut(&participant_id) else {
            return;
        };
        if binding.conn_id != conn_id {
            // Reverse index said current, binding disagrees — the bind
            // that displaced this connection already cleaned up.
            return;
        }

        // One armed timer per participant: replace, never stack.
        if let BindingState::GracePending { timer, .. } = &binding.state {
            timer.abort();
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let grace = self.config.grace_period;
        let departures = self.departures.clone();
        let departure = Departure {
            participant_id: participant_id.clone(),
            session_id: binding.session_id.clone(),
            generation,
        };

        let timer = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            // Receiver gone means the coordinator is shutting down.
            let _ = departures.send(departure);
        });

        binding.state = BindingState::GracePending { generation, timer };
        tracing::info!(
            %participant_id,
            %conn_id,
            grace_secs = grace.as_secs_f64(),
            "connection closed, grace period started"
        );
    }

    /// Consumes a departure whose grace timer fired.
    ///
    /// Returns the departed binding's session and connection iff the
    /// participant is still grace-pending at the same generation.
    /// Returns `None` when a rebind won the race after the timer fired
    /// but before the coordinator processed the departure.
    pub fn take_departed(
        &mut self,
        participant_id: &ParticipantId,
        generation: u64,
    ) -> Option<(SessionId, ConnectionId)> {
        let binding = self.bindings.get(participant_id)?;
        match binding.state {
            BindingState::GracePending { generation: g, .. }
                if g == generation =>
            {
                let binding = self
                    .bindings
                    .remove(participant_id)
                    .expect("checked above");
                self.by_connection.remove(&binding.conn_id);
                tracing::info!(
                    %participant_id,
                    session_id = %binding.session_id,
                    "grace period expired, participant departed"
                );
                Some((binding.session_id, binding.conn_id))
            }
            _ => None,
        }
    }

    /// Drops every binding for a closed session, aborting pending
    /// timers. Used when the host closes the session: nobody in it can
    /// depart from a room that no longer exists.
    pub fn remove_session(&mut self, session_id: &SessionId) {
        let doomed: Vec<ParticipantId> = self
            .bindings
            .iter()
            .filter(|(_, b)| &b.session_id == session_id)
            .map(|(pid, _)| pid.clone())
            .collect();

        for participant_id in doomed {
            if let Some(binding) = self.bindings.remove(&participant_id) {
                if let BindingState::GracePending { timer, .. } =
                    binding.state
                {
                    timer.abort();
                }
                self.by_connection.remove(&binding.conn_id);
            }
        }
    }

    /// Returns `true` if the participant has a live (not grace-pending)
    /// binding.
    pub fn is_bound(&self, participant_id: &ParticipantId) -> bool {
        self.bindings
            .get(participant_id)
            .is_some_and(|b| matches!(b.state, BindingState::Bound))
    }

    /// Returns the number of tracked bindings (any state).
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if no bindings are tracked.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
