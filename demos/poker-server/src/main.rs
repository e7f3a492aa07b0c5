//! Runnable Pointcast demo: an estimation server over the in-memory
//! store.
//!
//! Seeds one session at startup and logs the ids, so WebSocket clients
//! (or `websocat`) can join immediately:
//!
//! ```text
//! {"event":"join-session","data":{"sessionId":"<id>","participantId":"<id>"}}
//! ```

use std::sync::Arc;

use pointcast::prelude::*;
use pointcast_store::MemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = Arc::new(MemoryStore::new());

    // Seed a session to play with. A real deployment registers
    // sessions and participants through its HTTP layer against the
    // same store; the realtime core doesn't care which.
    let (session_id, host_id) = store
        .create_session("Demo Host", None, EstimationScale::Fibonacci)
        .await?;
    let guest_id = ParticipantId("demo-guest".into());
    store
        .join_session(&session_id, &guest_id, "Demo Guest", None)
        .await?;

    tracing::info!(%session_id, %host_id, %guest_id, "demo session seeded");

    let server = PointcastServerBuilder::new()
        .bind("0.0.0.0:8080")
        .build(store)
        .await?;

    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await?;
    Ok(())
}
