//! # Pointcast
//!
//! Real-time coordination core for collaborative estimation sessions
//! ("planning poker").
//!
//! A host opens a session, participants join, the host starts features
//! to estimate, everyone votes in secret, and the host reveals the
//! results to all connected clients at once. This crate is the part
//! with genuine concurrency in it: socket-to-participant binding,
//! room-scoped broadcast of state transitions, host-privilege
//! enforcement, and disconnect grace-period handling.
//!
//! ## Layers
//!
//! ```text
//! pointcast-transport   WebSocket in, frames out
//! pointcast-protocol    events and records on the wire
//! pointcast-store       sessions, participants, features, votes
//! pointcast-registry    who is live on which connection
//! pointcast-room        session-scoped fan-out
//! pointcast (this)      coordinator, connection handler, server
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pointcast::prelude::*;
//! use pointcast_store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PointcastError> {
//!     let server = PointcastServerBuilder::new()
//!         .bind("0.0.0.0:8080")
//!         .build(MemoryStore::new())
//!         .await?;
//!     server.run().await
//! }
//! ```

mod coordinator;
mod error;
mod handler;
mod server;

pub use coordinator::{ConnectionHandle, Coordinator, run_departure_drain};
pub use error::PointcastError;
pub use server::{PointcastServer, PointcastServerBuilder};

/// The common imports for building on Pointcast.
pub mod prelude {
    pub use crate::{
        ConnectionHandle, Coordinator, PointcastError, PointcastServer,
        PointcastServerBuilder, run_departure_drain,
    };
    pub use pointcast_protocol::{
        ClientEvent, EstimationScale, FeatureId, ParticipantId, ServerEvent,
        SessionId,
    };
    pub use pointcast_registry::RegistryConfig;
    pub use pointcast_store::SessionStore;
}
