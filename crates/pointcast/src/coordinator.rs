//! The session coordinator: the heart of the real-time core.
//!
//! Every inbound action runs as one atomic step:
//!
//! ```text
//!   validate ──→ apply (store round-trips) ──→ broadcast
//! ```
//!
//! A per-session async mutex is held across the whole step, so two
//! actions against the same session can never interleave their apply
//! phases — the net effect of concurrent submits is last-write-wins by
//! arrival order *at the coordinator*, even when store writes complete
//! out of order. Different sessions share nothing and never block each
//! other.
//!
//! Failure discipline: the registry and broadcaster are only touched
//! after every store call in the action has succeeded. A rejected or
//! failed action therefore unicasts an `error` event and changes nothing
//! else — no partial broadcasts, no stray room membership.

use std::collections::HashMap;
use std::sync::Arc;

use pointcast_protocol::{
    ClientEvent, FeatureId, ParticipantId, ServerEvent, SessionId,
};
use pointcast_registry::{ConnectionRegistry, Departure, RegistryConfig};
use pointcast_room::{ClientSender, RoomBroadcaster, send_to_one};
use pointcast_store::{SessionStore, StoreError};
use pointcast_transport::ConnectionId;
use tokio::sync::{Mutex, mpsc};

/// One connection, as the coordinator sees it: an id for the registry
/// and the sending end of the connection's outbound queue.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub conn_id: ConnectionId,
    pub sender: ClientSender,
}

/// Why an action produced no state change.
enum ActionError {
    /// Validation or authorization rejection; the message is unicast to
    /// the caller verbatim.
    Rejected(String),

    /// The store failed mid-action; the caller gets a generic
    /// "Failed to <action>" and the details go to the log.
    Store {
        action: &'static str,
        source: StoreError,
    },
}

fn rejected(message: &str) -> ActionError {
    ActionError::Rejected(message.to_owned())
}

/// Curries the action name into a `map_err` for store calls.
fn store_err(
    action: &'static str,
) -> impl FnOnce(StoreError) -> ActionError {
    move |source| ActionError::Store { action, source }
}

/// Validates every inbound real-time action, applies it through the
/// session store, and broadcasts the resulting events to the session's
/// room.
///
/// The registry and broadcaster are owned here and mutated only inside
/// action handlers while holding their mutex — never across a store
/// round-trip, so they are never observable in a half-updated state.
pub struct Coordinator<S: SessionStore> {
    store: S,
    registry: Mutex<ConnectionRegistry>,
    rooms: Mutex<RoomBroadcaster>,
    /// Per-session apply locks. An entry lives as long as its session;
    /// `close_session` retires it.
    session_locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl<S: SessionStore> Coordinator<S> {
    /// Creates a coordinator and the departure stream its registry
    /// feeds.
    ///
    /// The returned receiver must be drained (see
    /// [`run_departure_drain`]) or grace-period expiries will pile up
    /// unprocessed.
    pub fn new(
        store: S,
        config: RegistryConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Departure>) {
        let (registry, departures) = ConnectionRegistry::new(config);
        (
            Arc::new(Self {
                store,
                registry: Mutex::new(registry),
                rooms: Mutex::new(RoomBroadcaster::new()),
                session_locks: Mutex::new(HashMap::new()),
            }),
            departures,
        )
    }

    /// Processes one inbound action from a connection.
    ///
    /// Never returns an error: rejections and failures are delivered to
    /// the issuing connection as unicast `error` events, and the
    /// connection keeps running.
    pub async fn handle_event(
        &self,
        conn: &ConnectionHandle,
        event: ClientEvent,
    ) {
        let lock = self.session_lock(event.session_id()).await;
        let _apply = lock.lock().await;

        let result = match event {
            ClientEvent::JoinSession {
                session_id,
                participant_id,
            } => self.join_session(conn, &session_id, &participant_id).await,
            ClientEvent::SubmitVote {
                session_id,
                feature_id,
                participant_id,
                value,
            } => {
                self.submit_vote(
                    &session_id,
                    &feature_id,
                    &participant_id,
                    &value,
                )
                .await
            }
            ClientEvent::UnsubmitVote {
                session_id,
                feature_id,
                participant_id,
            } => {
                self.unsubmit_vote(&session_id, &feature_id, &participant_id)
                    .await
            }
            ClientEvent::StartFeature {
                session_id,
                participant_id,
                name,
                link,
            } => {
                self.start_feature(
                    &session_id,
                    &participant_id,
                    name.as_deref(),
                    link.as_deref(),
                )
                .await
            }
            ClientEvent::RevealResults {
                session_id,
                feature_id,
                participant_id,
            } => {
                self.reveal_results(&session_id, &feature_id, &participant_id)
                    .await
            }
            ClientEvent::CloseSession {
                session_id,
                participant_id,
            } => self.close_session(&session_id, &participant_id).await,
        };

        if let Err(error) = result {
            let message = match error {
                ActionError::Rejected(message) => message,
                ActionError::Store { action, source } => {
                    tracing::error!(
                        conn_id = %conn.conn_id,
                        error = %source,
                        "store failure while handling {action}"
                    );
                    format!("Failed to {action}")
                }
            };
            send_to_one(&conn.sender, ServerEvent::Error { message });
        }
    }

    /// Reacts to a transport-level connection close. Starts the grace
    /// timer if the connection was a participant's current binding.
    pub async fn handle_disconnect(&self, conn_id: ConnectionId) {
        self.registry.lock().await.connection_closed(conn_id);
    }

    /// Processes one expired grace period.
    ///
    /// Host status is re-checked here, at expiry time — not at
    /// disconnect time — so the broadcast reflects the session as it is
    /// when the participant actually departs.
    pub async fn handle_departure(&self, departure: Departure) {
        let lock = self.session_lock(&departure.session_id).await;
        let _apply = lock.lock().await;

        let taken = self
            .registry
            .lock()
            .await
            .take_departed(&departure.participant_id, departure.generation);
        let Some((session_id, conn_id)) = taken else {
            // A rebind won the race after the timer fired; the
            // participant never left.
            return;
        };

        // A store failure here degrades to "not host": the departure
        // must still be announced exactly once either way.
        let is_host = self
            .store
            .is_host(&session_id, &departure.participant_id)
            .await
            .unwrap_or_else(|error| {
                tracing::error!(
                    %session_id,
                    participant_id = %departure.participant_id,
                    %error,
                    "host check failed at grace expiry"
                );
                false
            });

        self.rooms.lock().await.leave_room(&session_id, conn_id);

        if is_host {
            tracing::info!(
                %session_id,
                participant_id = %departure.participant_id,
                "host departed after grace period"
            );
            self.rooms
                .lock()
                .await
                .broadcast(&session_id, &ServerEvent::HostDisconnected {});
        } else {
            // The participant record goes first; the broadcast happens
            // regardless, because their presence is gone either way.
            if let Err(error) = self
                .store
                .remove_participant(&departure.participant_id)
                .await
            {
                tracing::error!(
                    participant_id = %departure.participant_id,
                    %error,
                    "failed to remove departed participant"
                );
            }
            tracing::info!(
                %session_id,
                participant_id = %departure.participant_id,
                "participant departed after grace period"
            );
            self.rooms.lock().await.broadcast(
                &session_id,
                &ServerEvent::ParticipantLeft {
                    participant_id: departure.participant_id,
                },
            );
        }
    }

    // -----------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------

    async fn join_session(
        &self,
        conn: &ConnectionHandle,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> Result<(), ActionError> {
        let valid = self
            .store
            .is_session_valid(session_id)
            .await
            .map_err(store_err("join session"))?;
        if !valid {
            return Err(rejected("Session not found or expired"));
        }

        // The coordinator never creates participants — joining the room
        // requires having joined the session through the join endpoint
        // first.
        let is_member = self
            .store
            .participant_exists_in_session(participant_id, session_id)
            .await
            .map_err(store_err("join session"))?;
        if !is_member {
            return Err(rejected("Participant not found in session"));
        }

        let participant = self
            .store
            .get_participant(participant_id)
            .await
            .map_err(store_err("join session"))?
            .ok_or_else(|| rejected("Participant not found in session"))?;
        let snapshot = self
            .store
            .get_session(session_id)
            .await
            .map_err(store_err("join session"))?
            .ok_or_else(|| rejected("Session not found or expired"))?;

        // Store reads done; from here on only in-memory state moves.
        let outcome = self.registry.lock().await.bind(
            participant_id,
            session_id,
            conn.conn_id,
        );

        {
            let mut rooms = self.rooms.lock().await;
            if let Some(replaced) = outcome.replaced {
                rooms.leave_room(session_id, replaced);
            }
            rooms.join_room(session_id, conn.conn_id, conn.sender.clone());

            // A reconnect within the grace window is invisible to the
            // room — the participant never "left".
            if !outcome.reconnect {
                rooms.broadcast(
                    session_id,
                    &ServerEvent::ParticipantJoined { participant },
                );
            }
        }

        // The joiner always gets the full current state, reconnect or
        // not — their view may be arbitrarily stale.
        send_to_one(&conn.sender, ServerEvent::SessionUpdated(snapshot));

        tracing::info!(
            %session_id,
            %participant_id,
            conn_id = %conn.conn_id,
            reconnect = outcome.reconnect,
            "participant joined session room"
        );
        Ok(())
    }

    async fn submit_vote(
        &self,
        session_id: &SessionId,
        feature_id: &FeatureId,
        participant_id: &ParticipantId,
        value: &str,
    ) -> Result<(), ActionError> {
        let is_member = self
            .store
            .participant_exists_in_session(participant_id, session_id)
            .await
            .map_err(store_err("submit vote"))?;
        if !is_member {
            return Err(rejected("Unauthorized"));
        }

        self.store
            .submit_vote(feature_id, participant_id, value)
            .await
            .map_err(store_err("submit vote"))?;

        self.rooms.lock().await.broadcast(
            session_id,
            &ServerEvent::VoteSubmitted {
                feature_id: feature_id.clone(),
                participant_id: participant_id.clone(),
                value: value.to_owned(),
            },
        );

        tracing::debug!(%session_id, %feature_id, %participant_id, "vote submitted");
        Ok(())
    }

    async fn unsubmit_vote(
        &self,
        session_id: &SessionId,
        feature_id: &FeatureId,
        participant_id: &ParticipantId,
    ) -> Result<(), ActionError> {
        let is_member = self
            .store
            .participant_exists_in_session(participant_id, session_id)
            .await
            .map_err(store_err("unsubmit vote"))?;
        if !is_member {
            return Err(rejected("Unauthorized"));
        }

        // Absent vote is a no-op in the store; the broadcast still goes
        // out so clients converge on "no vote" either way.
        self.store
            .delete_vote(feature_id, participant_id)
            .await
            .map_err(store_err("unsubmit vote"))?;

        self.rooms.lock().await.broadcast(
            session_id,
            &ServerEvent::VoteUnsubmitted {
                feature_id: feature_id.clone(),
                participant_id: participant_id.clone(),
            },
        );

        tracing::debug!(%session_id, %feature_id, %participant_id, "vote unsubmitted");
        Ok(())
    }

    async fn start_feature(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
        name: Option<&str>,
        link: Option<&str>,
    ) -> Result<(), ActionError> {
        let is_host = self
            .store
            .is_host(session_id, participant_id)
            .await
            .map_err(store_err("start feature"))?;
        if !is_host {
            return Err(rejected("Only the host can start features"));
        }

        // Newest unrevealed feature is the current one by construction.
        let feature = self
            .store
            .create_feature(session_id, name, link)
            .await
            .map_err(store_err("start feature"))?;

        tracing::info!(%session_id, feature_id = %feature.id, "feature started");
        self.rooms
            .lock()
            .await
            .broadcast(session_id, &ServerEvent::FeatureStarted { feature });
        Ok(())
    }

    async fn reveal_results(
        &self,
        session_id: &SessionId,
        feature_id: &FeatureId,
        participant_id: &ParticipantId,
    ) -> Result<(), ActionError> {
        let is_host = self
            .store
            .is_host(session_id, participant_id)
            .await
            .map_err(store_err("reveal results"))?;
        if !is_host {
            return Err(rejected("Only the host can reveal results"));
        }

        // Idempotent: revealing twice re-broadcasts, it doesn't error.
        let feature = self
            .store
            .reveal_results(feature_id)
            .await
            .map_err(store_err("reveal results"))?;
        let has_consensus = self
            .store
            .check_consensus(feature_id)
            .await
            .map_err(store_err("reveal results"))?;

        tracing::info!(%session_id, %feature_id, has_consensus, "results revealed");
        self.rooms.lock().await.broadcast(
            session_id,
            &ServerEvent::ResultsRevealed {
                feature,
                has_consensus,
            },
        );
        Ok(())
    }

    async fn close_session(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> Result<(), ActionError> {
        let is_host = self
            .store
            .is_host(session_id, participant_id)
            .await
            .map_err(store_err("close session"))?;
        if !is_host {
            return Err(rejected("Only the host can close the session"));
        }

        let deleted = self
            .store
            .delete_session(session_id)
            .await
            .map_err(store_err("close session"))?;
        if !deleted {
            return Err(ActionError::Store {
                action: "close session",
                source: StoreError::SessionNotFound(session_id.clone()),
            });
        }

        tracing::info!(%session_id, "session closed by host");

        // Final broadcast, then evict: once clients act on
        // session-closed the room ceases to matter.
        {
            let mut rooms = self.rooms.lock().await;
            rooms.broadcast(
                session_id,
                &ServerEvent::SessionClosed {
                    session_id: session_id.clone(),
                },
            );
            rooms.remove_session(session_id);
        }
        self.registry.lock().await.remove_session(session_id);
        self.session_locks.lock().await.remove(session_id);

        Ok(())
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Returns the apply lock for a session, creating it on first use.
    async fn session_lock(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks.entry(session_id.clone()).or_default().clone()
    }
}

/// Drains the registry's departure stream into the coordinator.
///
/// Runs until the registry (and with it, the send side) is dropped.
/// The server spawns this once at startup; tests can drive
/// [`Coordinator::handle_departure`] directly instead.
pub async fn run_departure_drain<S: SessionStore>(
    coordinator: Arc<Coordinator<S>>,
    mut departures: mpsc::UnboundedReceiver<Departure>,
) {
    while let Some(departure) = departures.recv().await {
        coordinator.handle_departure(departure).await;
    }
}
