//! Per-connection handler: frame decoding and event routing.
//!
//! Each accepted connection gets two Tokio tasks:
//!   - the **reader** (this handler) decodes inbound frames and hands
//!     them to the coordinator, one at a time
//!   - the **writer** drains the connection's outbound event queue and
//!     pushes encoded frames down the socket
//!
//! The split matters: room broadcasts land on the outbound queue while
//! the reader is parked waiting for the next frame, and they must flow
//! out immediately.

use std::sync::Arc;

use pointcast_protocol::{ClientEvent, Codec, ServerEvent};
use pointcast_room::send_to_one;
use pointcast_store::SessionStore;
use pointcast_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::PointcastError;
use crate::coordinator::{ConnectionHandle, Coordinator};

/// Drop guard that reports the connection as closed when the reader
/// exits.
///
/// This ensures the grace timer starts even if the handler panics.
/// Since `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async registry lock.
struct DisconnectGuard<S: SessionStore> {
    conn_id: ConnectionId,
    coordinator: Arc<Coordinator<S>>,
}

impl<S: SessionStore> Drop for DisconnectGuard<S> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            coordinator.handle_disconnect(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, C>(
    conn: WebSocketConnection,
    coordinator: Arc<Coordinator<S>>,
    codec: C,
) -> Result<(), PointcastError>
where
    S: SessionStore,
    C: Codec + Clone,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let conn = Arc::new(conn);
    let (sender, mut outbound) = mpsc::unbounded_channel::<ServerEvent>();

    // --- Writer task ---
    // Exits when every sender clone is gone (handler, registry, rooms)
    // or the first send fails because the socket died.
    let writer_conn = Arc::clone(&conn);
    let writer_codec = codec.clone();
    tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let bytes = match writer_codec.encode(&event) {
                Ok(bytes) => bytes,
                Err(error) => {
                    tracing::error!(
                        conn_id = %writer_conn.id(),
                        %error,
                        "failed to encode outbound event"
                    );
                    continue;
                }
            };
            if writer_conn.send(&bytes).await.is_err() {
                break;
            }
        }
    });

    let handle = ConnectionHandle { conn_id, sender };
    let _guard = DisconnectGuard {
        conn_id,
        coordinator: Arc::clone(&coordinator),
    };

    // --- Reader loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(error) => {
                tracing::debug!(%conn_id, %error, "recv error");
                break;
            }
        };

        let event: ClientEvent = match codec.decode(&data) {
            Ok(event) => event,
            Err(error) => {
                // A malformed frame is the client's problem, not a
                // reason to drop the connection.
                tracing::debug!(%conn_id, %error, "failed to decode frame");
                send_to_one(
                    &handle.sender,
                    ServerEvent::Error {
                        message: "Invalid message".to_owned(),
                    },
                );
                continue;
            }
        };

        coordinator.handle_event(&handle, event).await;
    }

    // _guard drops here → disconnect flows into the registry.
    Ok(())
}
