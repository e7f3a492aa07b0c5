//! The room broadcaster: session-scoped event fan-out.
//!
//! Delivery model: each connection handler owns the receiving end of an
//! unbounded channel; the broadcaster holds the sending ends, grouped by
//! session. A broadcast walks the session's senders synchronously, so
//! the sequence of broadcasts issued by one coordinator action reaches
//! every connection's queue in issue order — no reordering within one
//! session's event stream. Delivery order *across* recipients is
//! unspecified, which is fine: each client only sees its own queue.

use std::collections::HashMap;

use pointcast_protocol::{ServerEvent, SessionId};
use pointcast_transport::ConnectionId;
use tokio::sync::mpsc;

/// Sending end of a connection's outbound event queue.
///
/// The paired receiver is drained by the connection's writer task, which
/// encodes each event and pushes it down the socket.
pub type ClientSender = mpsc::UnboundedSender<ServerEvent>;

/// Delivers an event to a single connection.
///
/// Used for error replies and the initial state snapshot — both can
/// target a connection that hasn't joined any room (a failed join never
/// subscribes), so unicast works on the raw sender, not on membership.
/// A closed channel is ignored: the connection is already gone and its
/// handler is unwinding.
pub fn send_to_one(sender: &ClientSender, event: ServerEvent) {
    let _ = sender.send(event);
}

/// Groups connections by session and fans events out to them.
pub struct RoomBroadcaster {
    rooms: HashMap<SessionId, HashMap<ConnectionId, ClientSender>>,
}

impl RoomBroadcaster {
    /// Creates an empty broadcaster.
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Subscribes a connection to a session's event stream.
    ///
    /// Idempotent: re-joining replaces the stored sender, which is what
    /// a rebind wants anyway (the new connection's sender wins).
    pub fn join_room(
        &mut self,
        session_id: &SessionId,
        conn_id: ConnectionId,
        sender: ClientSender,
    ) {
        self.rooms
            .entry(session_id.clone())
            .or_default()
            .insert(conn_id, sender);
        tracing::debug!(%session_id, %conn_id, "connection joined room");
    }

    /// Unsubscribes a connection from a session's event stream.
    /// Unknown connection or session is a no-op.
    pub fn leave_room(
        &mut self,
        session_id: &SessionId,
        conn_id: ConnectionId,
    ) {
        if let Some(members) = self.rooms.get_mut(session_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                self.rooms.remove(session_id);
            }
        }
    }

    /// Delivers an event to every connection in the session's room,
    /// including the one that triggered it.
    ///
    /// Senders whose connection has gone away are pruned as they are
    /// discovered. Returns the number of connections that received the
    /// event.
    pub fn broadcast(
        &mut self,
        session_id: &SessionId,
        event: &ServerEvent,
    ) -> usize {
        let Some(members) = self.rooms.get_mut(session_id) else {
            return 0;
        };

        let mut delivered = 0;
        members.retain(|conn_id, sender| {
            match sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    // Writer task is gone; the connection is dead.
                    tracing::debug!(
                        %session_id,
                        %conn_id,
                        "pruning dead connection from room"
                    );
                    false
                }
            }
        });
        if members.is_empty() {
            self.rooms.remove(session_id);
        }
        delivered
    }

    /// Drops a whole room. Used when a session is closed: subscribed
    /// connections are logically evicted and the room ceases to matter.
    /// Returns how many connections were subscribed.
    pub fn remove_session(&mut self, session_id: &SessionId) -> usize {
        self.rooms
            .remove(session_id)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Returns `true` if the connection is subscribed to the session.
    pub fn is_member(
        &self,
        session_id: &SessionId,
        conn_id: ConnectionId,
    ) -> bool {
        self.rooms
            .get(session_id)
            .is_some_and(|members| members.contains_key(&conn_id))
    }

    /// Number of connections subscribed to a session.
    pub fn connection_count(&self, session_id: &SessionId) -> usize {
        self.rooms
            .get(session_id)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Number of sessions with at least one subscribed connection.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
