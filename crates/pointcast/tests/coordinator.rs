//! Integration tests for the session coordinator.
//!
//! These drive `Coordinator` directly — no sockets, no codec. Each fake
//! client is just a `ConnectionHandle` plus the receiving end of its
//! outbound queue, which is exactly what the transport layer provides
//! in production. Grace-period tests run on Tokio's paused virtual
//! clock, so "wait three seconds" costs microseconds and never flakes.

use std::sync::Arc;
use std::time::Duration;

use pointcast::prelude::*;
use pointcast_registry::Departure;
use pointcast_store::MemoryStore;
use pointcast_transport::ConnectionId;
use tokio::sync::mpsc::{self, UnboundedReceiver, error::TryRecvError};

// =========================================================================
// Harness
// =========================================================================

/// A fake connected client.
struct TestClient {
    handle: ConnectionHandle,
    rx: UnboundedReceiver<ServerEvent>,
}

impl TestClient {
    fn new(conn: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handle: ConnectionHandle {
                conn_id: ConnectionId::new(conn),
                sender: tx,
            },
            rx,
        }
    }

    /// Pops the next queued event; panics if none is waiting.
    fn next(&mut self) -> ServerEvent {
        self.rx.try_recv().expect("expected a queued event")
    }

    fn assert_no_events(&mut self) {
        assert_eq!(
            self.rx.try_recv().unwrap_err(),
            TryRecvError::Empty,
            "expected no queued events"
        );
    }

    fn drain(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}

/// A coordinator over a seeded store: one FIBONACCI session with a host.
struct Harness {
    store: Arc<MemoryStore>,
    coordinator: Arc<Coordinator<Arc<MemoryStore>>>,
    departures: UnboundedReceiver<Departure>,
    session_id: SessionId,
    host_id: ParticipantId,
}

async fn harness() -> Harness {
    harness_with_store(MemoryStore::new()).await
}

async fn harness_with_store(store: MemoryStore) -> Harness {
    let store = Arc::new(store);
    let (session_id, host_id) = store
        .create_session("Host", None, EstimationScale::Fibonacci)
        .await
        .expect("seed session");
    let (coordinator, departures) =
        Coordinator::new(Arc::clone(&store), RegistryConfig::default());
    Harness {
        store,
        coordinator,
        departures,
        session_id,
        host_id,
    }
}

impl Harness {
    /// Registers a participant in the store (what the join endpoint
    /// does) and binds a fresh client connection for them.
    async fn join_participant(
        &self,
        client: &TestClient,
        participant_id: &str,
        name: &str,
    ) -> ParticipantId {
        let pid = ParticipantId(participant_id.to_owned());
        self.store
            .join_session(&self.session_id, &pid, name, None)
            .await
            .expect("register participant");
        self.join(client, &pid).await;
        pid
    }

    /// Binds a client connection for an already-registered participant.
    async fn join(&self, client: &TestClient, participant_id: &ParticipantId) {
        self.coordinator
            .handle_event(
                &client.handle,
                ClientEvent::JoinSession {
                    session_id: self.session_id.clone(),
                    participant_id: participant_id.clone(),
                },
            )
            .await;
    }

    async fn submit_vote(
        &self,
        client: &TestClient,
        participant_id: &ParticipantId,
        feature_id: &FeatureId,
        value: &str,
    ) {
        self.coordinator
            .handle_event(
                &client.handle,
                ClientEvent::SubmitVote {
                    session_id: self.session_id.clone(),
                    feature_id: feature_id.clone(),
                    participant_id: participant_id.clone(),
                    value: value.to_owned(),
                },
            )
            .await;
    }

    async fn start_feature(
        &self,
        client: &TestClient,
        participant_id: &ParticipantId,
    ) -> FeatureId {
        self.coordinator
            .handle_event(
                &client.handle,
                ClientEvent::StartFeature {
                    session_id: self.session_id.clone(),
                    participant_id: participant_id.clone(),
                    name: None,
                    link: None,
                },
            )
            .await;
        // The id comes back on the broadcast; read it from the store
        // instead so callers don't have to drain their queue here.
        let snapshot = self
            .store
            .get_session(&self.session_id)
            .await
            .unwrap()
            .expect("session exists");
        snapshot
            .current_feature
            .expect("feature was started")
            .id
    }

    async fn reveal(
        &self,
        client: &TestClient,
        participant_id: &ParticipantId,
        feature_id: &FeatureId,
    ) {
        self.coordinator
            .handle_event(
                &client.handle,
                ClientEvent::RevealResults {
                    session_id: self.session_id.clone(),
                    feature_id: feature_id.clone(),
                    participant_id: participant_id.clone(),
                },
            )
            .await;
    }
}

fn assert_error(event: ServerEvent, expected: &str) {
    match event {
        ServerEvent::Error { message } => assert_eq!(message, expected),
        other => panic!("expected error {expected:?}, got {other:?}"),
    }
}

/// Advances virtual time and lets woken timer tasks run.
async fn advance(duration: Duration) {
    // Let freshly-spawned timer tasks be polled so their `sleep`
    // deadlines register *before* the clock jumps — otherwise the
    // deadline lands past the advanced `now` and never fires.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::advance(duration).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// Join
// =========================================================================

#[tokio::test]
async fn test_join_session_broadcasts_then_syncs_joiner() {
    let h = harness().await;
    let mut host = TestClient::new(1);

    h.join(&host, &h.host_id).await;

    // The joiner is in the room before the broadcast goes out, so they
    // hear their own arrival, then get the full snapshot.
    match host.next() {
        ServerEvent::ParticipantJoined { participant } => {
            assert_eq!(participant.id, h.host_id);
            assert!(participant.is_host);
        }
        other => panic!("expected participant-joined, got {other:?}"),
    }
    match host.next() {
        ServerEvent::SessionUpdated(snapshot) => {
            assert_eq!(snapshot.session.id, h.session_id);
            assert_eq!(snapshot.session.participants.len(), 1);
        }
        other => panic!("expected session-updated, got {other:?}"),
    }
    host.assert_no_events();
}

#[tokio::test]
async fn test_join_session_notifies_participants_already_in_room() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    let mut guest = TestClient::new(2);
    h.join(&host, &h.host_id).await;
    host.drain();

    let pid = h.join_participant(&guest, "p-guest", "Grace").await;

    match host.next() {
        ServerEvent::ParticipantJoined { participant } => {
            assert_eq!(participant.id, pid);
            assert!(!participant.is_host);
        }
        other => panic!("expected participant-joined, got {other:?}"),
    }
    // The guest hears their own arrival too, then the snapshot with
    // both participants.
    guest.next();
    match guest.next() {
        ServerEvent::SessionUpdated(snapshot) => {
            assert_eq!(snapshot.session.participants.len(), 2);
        }
        other => panic!("expected session-updated, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_session_unknown_session_unicasts_error() {
    let h = harness().await;
    let mut client = TestClient::new(1);

    h.coordinator
        .handle_event(
            &client.handle,
            ClientEvent::JoinSession {
                session_id: SessionId("no-such-session".into()),
                participant_id: h.host_id.clone(),
            },
        )
        .await;

    assert_error(client.next(), "Session not found or expired");
    client.assert_no_events();
}

#[tokio::test]
async fn test_join_session_expired_session_unicasts_error() {
    // Zero-day retention: the session exists but is past its window.
    let h = harness_with_store(MemoryStore::with_retention_days(0)).await;
    let mut client = TestClient::new(1);

    h.join(&client, &h.host_id).await;

    assert_error(client.next(), "Session not found or expired");
    client.assert_no_events();
}

#[tokio::test]
async fn test_join_session_unregistered_participant_unicasts_error() {
    let h = harness().await;
    let mut client = TestClient::new(1);

    h.join(&client, &ParticipantId("never-registered".into())).await;

    assert_error(client.next(), "Participant not found in session");
    client.assert_no_events();
}

// =========================================================================
// Voting
// =========================================================================

#[tokio::test]
async fn test_submit_vote_broadcasts_raw_value_to_room() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    let mut guest = TestClient::new(2);
    h.join(&host, &h.host_id).await;
    let pid = h.join_participant(&guest, "p-guest", "Grace").await;
    let feature = h.start_feature(&host, &h.host_id).await;
    host.drain();
    guest.drain();

    h.submit_vote(&guest, &pid, &feature, "5").await;

    // Everyone hears it, voter included, value and all.
    for client in [&mut host, &mut guest] {
        match client.next() {
            ServerEvent::VoteSubmitted {
                feature_id,
                participant_id,
                value,
            } => {
                assert_eq!(feature_id, feature);
                assert_eq!(participant_id, pid);
                assert_eq!(value, "5");
            }
            other => panic!("expected vote-submitted, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_submit_vote_non_member_unauthorized_and_unchanged() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    let mut outsider = TestClient::new(2);
    h.join(&host, &h.host_id).await;
    let feature = h.start_feature(&host, &h.host_id).await;
    host.drain();

    h.submit_vote(&outsider, &ParticipantId("intruder".into()), &feature, "8")
        .await;

    assert_error(outsider.next(), "Unauthorized");
    host.assert_no_events();

    let snapshot =
        h.store.get_session(&h.session_id).await.unwrap().unwrap();
    assert!(
        snapshot.session.features[0].votes.is_empty(),
        "rejected action must not mutate state"
    );
}

#[tokio::test]
async fn test_submit_vote_unknown_feature_reports_failed_action() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    h.join(&host, &h.host_id).await;
    host.drain();

    h.submit_vote(&host, &h.host_id, &FeatureId("ghost".into()), "5")
        .await;

    assert_error(host.next(), "Failed to submit vote");
    host.assert_no_events();
}

#[tokio::test]
async fn test_rapid_double_vote_keeps_later_arrival() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    h.join(&host, &h.host_id).await;
    let feature = h.start_feature(&host, &h.host_id).await;
    host.drain();

    // Two submits racing on the same session serialize through the
    // per-session apply lock in arrival order: the later one wins.
    let first = h.coordinator.handle_event(
        &host.handle,
        ClientEvent::SubmitVote {
            session_id: h.session_id.clone(),
            feature_id: feature.clone(),
            participant_id: h.host_id.clone(),
            value: "3".into(),
        },
    );
    let second = h.coordinator.handle_event(
        &host.handle,
        ClientEvent::SubmitVote {
            session_id: h.session_id.clone(),
            feature_id: feature.clone(),
            participant_id: h.host_id.clone(),
            value: "8".into(),
        },
    );
    tokio::join!(first, second);

    let snapshot =
        h.store.get_session(&h.session_id).await.unwrap().unwrap();
    let votes = &snapshot.session.features[0].votes;
    assert_eq!(votes.len(), 1, "one vote per (feature, participant)");
    assert_eq!(votes[0].value, "8");
}

#[tokio::test]
async fn test_unsubmit_vote_removes_and_broadcasts() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    h.join(&host, &h.host_id).await;
    let feature = h.start_feature(&host, &h.host_id).await;
    h.submit_vote(&host, &h.host_id, &feature, "5").await;
    host.drain();

    h.coordinator
        .handle_event(
            &host.handle,
            ClientEvent::UnsubmitVote {
                session_id: h.session_id.clone(),
                feature_id: feature.clone(),
                participant_id: h.host_id.clone(),
            },
        )
        .await;

    match host.next() {
        ServerEvent::VoteUnsubmitted {
            feature_id,
            participant_id,
        } => {
            assert_eq!(feature_id, feature);
            assert_eq!(participant_id, h.host_id);
        }
        other => panic!("expected vote-unsubmitted, got {other:?}"),
    }

    let snapshot =
        h.store.get_session(&h.session_id).await.unwrap().unwrap();
    assert!(snapshot.session.features[0].votes.is_empty());
}

#[tokio::test]
async fn test_unsubmit_vote_never_submitted_is_noop_not_error() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    h.join(&host, &h.host_id).await;
    let feature = h.start_feature(&host, &h.host_id).await;
    host.drain();

    h.coordinator
        .handle_event(
            &host.handle,
            ClientEvent::UnsubmitVote {
                session_id: h.session_id.clone(),
                feature_id: feature.clone(),
                participant_id: h.host_id.clone(),
            },
        )
        .await;

    // Clients still converge on "no vote"; no error is produced.
    assert!(matches!(
        host.next(),
        ServerEvent::VoteUnsubmitted { .. }
    ));
    host.assert_no_events();
}

// =========================================================================
// Host privileges
// =========================================================================

#[tokio::test]
async fn test_start_feature_host_broadcasts_feature_started() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    h.join(&host, &h.host_id).await;
    host.drain();

    h.coordinator
        .handle_event(
            &host.handle,
            ClientEvent::StartFeature {
                session_id: h.session_id.clone(),
                participant_id: h.host_id.clone(),
                name: Some("checkout flow".into()),
                link: Some("https://tracker/PROJ-7".into()),
            },
        )
        .await;

    match host.next() {
        ServerEvent::FeatureStarted { feature } => {
            assert_eq!(feature.name.as_deref(), Some("checkout flow"));
            assert!(!feature.is_revealed);
            assert!(feature.votes.is_empty());
        }
        other => panic!("expected feature-started, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_feature_non_host_denied_without_side_effects() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    let mut guest = TestClient::new(2);
    h.join(&host, &h.host_id).await;
    let pid = h.join_participant(&guest, "p-guest", "Grace").await;
    host.drain();
    guest.drain();

    h.coordinator
        .handle_event(
            &guest.handle,
            ClientEvent::StartFeature {
                session_id: h.session_id.clone(),
                participant_id: pid,
                name: None,
                link: None,
            },
        )
        .await;

    assert_error(guest.next(), "Only the host can start features");
    guest.assert_no_events();
    host.assert_no_events();

    let snapshot =
        h.store.get_session(&h.session_id).await.unwrap().unwrap();
    assert!(snapshot.session.features.is_empty(), "no mutation");
}

#[tokio::test]
async fn test_reveal_results_non_host_denied() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    let mut guest = TestClient::new(2);
    h.join(&host, &h.host_id).await;
    let pid = h.join_participant(&guest, "p-guest", "Grace").await;
    let feature = h.start_feature(&host, &h.host_id).await;
    host.drain();
    guest.drain();

    h.reveal(&guest, &pid, &feature).await;

    assert_error(guest.next(), "Only the host can reveal results");
    guest.assert_no_events();
    host.assert_no_events();

    let snapshot =
        h.store.get_session(&h.session_id).await.unwrap().unwrap();
    assert!(!snapshot.session.features[0].is_revealed);
}

#[tokio::test]
async fn test_reveal_results_twice_rebroadcasts_not_errors() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    h.join(&host, &h.host_id).await;
    let feature = h.start_feature(&host, &h.host_id).await;
    host.drain();

    h.reveal(&host, &h.host_id, &feature).await;
    h.reveal(&host, &h.host_id, &feature).await;

    // Two reveals, two broadcasts, zero errors.
    for _ in 0..2 {
        match host.next() {
            ServerEvent::ResultsRevealed { feature, .. } => {
                assert!(feature.is_revealed);
            }
            other => panic!("expected results-revealed, got {other:?}"),
        }
    }
    host.assert_no_events();
}

#[tokio::test]
async fn test_reveal_results_unknown_feature_reports_failed_action() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    h.join(&host, &h.host_id).await;
    host.drain();

    h.reveal(&host, &h.host_id, &FeatureId("ghost".into())).await;

    assert_error(host.next(), "Failed to reveal results");
}

// =========================================================================
// Close session
// =========================================================================

#[tokio::test]
async fn test_close_session_broadcasts_and_deletes_everything() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    let mut guest = TestClient::new(2);
    h.join(&host, &h.host_id).await;
    h.join_participant(&guest, "p-guest", "Grace").await;
    host.drain();
    guest.drain();

    h.coordinator
        .handle_event(
            &host.handle,
            ClientEvent::CloseSession {
                session_id: h.session_id.clone(),
                participant_id: h.host_id.clone(),
            },
        )
        .await;

    for client in [&mut host, &mut guest] {
        match client.next() {
            ServerEvent::SessionClosed { session_id } => {
                assert_eq!(session_id, h.session_id);
            }
            other => panic!("expected session-closed, got {other:?}"),
        }
    }

    assert!(h.store.get_session(&h.session_id).await.unwrap().is_none());
    assert!(
        h.store.get_participant(&h.host_id).await.unwrap().is_none(),
        "close cascades"
    );
}

#[tokio::test]
async fn test_close_session_non_host_denied() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    let mut guest = TestClient::new(2);
    h.join(&host, &h.host_id).await;
    let pid = h.join_participant(&guest, "p-guest", "Grace").await;
    host.drain();
    guest.drain();

    h.coordinator
        .handle_event(
            &guest.handle,
            ClientEvent::CloseSession {
                session_id: h.session_id.clone(),
                participant_id: pid,
            },
        )
        .await;

    assert_error(guest.next(), "Only the host can close the session");
    host.assert_no_events();
    assert!(h.store.get_session(&h.session_id).await.unwrap().is_some());
}

// =========================================================================
// Disconnect and the grace period
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_grace_expiry_broadcasts_participant_left_and_removes_record()
{
    let mut h = harness().await;
    let mut host = TestClient::new(1);
    let mut guest = TestClient::new(2);
    h.join(&host, &h.host_id).await;
    let pid = h.join_participant(&guest, "p-guest", "Grace").await;
    host.drain();
    guest.drain();

    h.coordinator.handle_disconnect(guest.handle.conn_id).await;
    advance(Duration::from_secs(3)).await;

    let departure = h.departures.try_recv().expect("grace expired");
    h.coordinator.handle_departure(departure).await;

    match host.next() {
        ServerEvent::ParticipantLeft { participant_id } => {
            assert_eq!(participant_id, pid);
        }
        other => panic!("expected participant-left, got {other:?}"),
    }
    assert!(
        h.store.get_participant(&pid).await.unwrap().is_none(),
        "departed participant record is removed"
    );
    // Exactly one departure per disconnect cycle.
    assert!(h.departures.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_grace_emits_no_departure_events() {
    let mut h = harness().await;
    let mut host = TestClient::new(1);
    let mut guest = TestClient::new(2);
    h.join(&host, &h.host_id).await;
    let pid = h.join_participant(&guest, "p-guest", "Grace").await;
    host.drain();
    guest.drain();

    h.coordinator.handle_disconnect(guest.handle.conn_id).await;
    advance(Duration::from_secs(1)).await;

    // Page refresh: same participant id, fresh connection.
    let mut guest2 = TestClient::new(3);
    h.join(&guest2, &pid).await;

    // Reconnects are invisible: no participant-joined broadcast, just
    // the snapshot for the rejoining connection.
    host.assert_no_events();
    assert!(matches!(guest2.next(), ServerEvent::SessionUpdated(_)));
    guest2.assert_no_events();

    // And the original timer never fires.
    advance(Duration::from_secs(10)).await;
    assert!(h.departures.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_host_grace_expiry_broadcasts_host_disconnected() {
    let mut h = harness().await;
    let mut host = TestClient::new(1);
    let mut guest = TestClient::new(2);
    h.join(&host, &h.host_id).await;
    h.join_participant(&guest, "p-guest", "Grace").await;
    host.drain();
    guest.drain();

    h.coordinator.handle_disconnect(host.handle.conn_id).await;
    advance(Duration::from_secs(3)).await;

    let departure = h.departures.try_recv().expect("grace expired");
    h.coordinator.handle_departure(departure).await;

    assert!(matches!(guest.next(), ServerEvent::HostDisconnected {}));
    guest.assert_no_events();

    // Host departure does not delete the session or reassign the role:
    // the session stays open, host-less, until explicitly closed.
    assert!(
        h.store
            .get_participant(&h.host_id)
            .await
            .unwrap()
            .is_some(),
        "host record is kept"
    );
    assert!(h.store.is_session_valid(&h.session_id).await.unwrap());
}

// =========================================================================
// The full estimation scenario
// =========================================================================

#[tokio::test]
async fn test_full_scenario_two_rounds_to_consensus() {
    let h = harness().await;
    let mut host = TestClient::new(1);
    let mut guest = TestClient::new(2);

    // Host creates session S (harness), P joins.
    h.join(&host, &h.host_id).await;
    let pid = h.join_participant(&guest, "p-guest", "Pat").await;
    host.drain();
    guest.drain();

    // Round 1: split vote.
    let f1 = h.start_feature(&host, &h.host_id).await;
    h.submit_vote(&guest, &pid, &f1, "5").await;
    h.submit_vote(&host, &h.host_id, &f1, "8").await;
    h.reveal(&host, &h.host_id, &f1).await;

    guest.drain();
    let revealed = loop {
        match host.next() {
            ServerEvent::ResultsRevealed {
                feature,
                has_consensus,
            } => break (feature, has_consensus),
            _ => continue,
        }
    };
    assert!(!revealed.1, "5 vs 8 is no consensus");
    assert_eq!(revealed.0.votes.len(), 2, "both votes are visible");

    // Round 2: everyone lands on 3.
    let f2 = h.start_feature(&host, &h.host_id).await;
    assert_ne!(f1, f2);
    h.submit_vote(&guest, &pid, &f2, "3").await;
    h.submit_vote(&host, &h.host_id, &f2, "3").await;
    h.reveal(&host, &h.host_id, &f2).await;

    let revealed = loop {
        match host.next() {
            ServerEvent::ResultsRevealed {
                feature,
                has_consensus,
            } => break (feature, has_consensus),
            _ => continue,
        }
    };
    assert!(revealed.1, "3 and 3 is consensus");
    assert!(revealed.0.votes.iter().all(|v| v.value == "3"));

    // F1's reveal is permanent.
    let snapshot =
        h.store.get_session(&h.session_id).await.unwrap().unwrap();
    assert!(snapshot.session.features.iter().all(|f| f.is_revealed));
}
