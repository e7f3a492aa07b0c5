//! `PointcastServer` builder and accept loop.
//!
//! This is the entry point for running a Pointcast real-time server. It
//! ties the layers together: transport → protocol → coordinator
//! (store + registry + rooms).

use std::sync::Arc;

use pointcast_protocol::JsonCodec;
use pointcast_registry::RegistryConfig;
use pointcast_store::SessionStore;
use pointcast_transport::{Transport, WebSocketTransport};

use crate::PointcastError;
use crate::coordinator::{Coordinator, run_departure_drain};
use crate::handler::handle_connection;

/// Builder for configuring and starting a Pointcast server.
///
/// # Example
///
/// ```rust,ignore
/// use pointcast::prelude::*;
/// use pointcast_store::MemoryStore;
///
/// let server = PointcastServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(MemoryStore::new())
///     .await?;
/// server.run().await
/// ```
pub struct PointcastServerBuilder {
    bind_addr: String,
    registry_config: RegistryConfig,
}

impl PointcastServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            registry_config: RegistryConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the connection-registry configuration (grace period).
    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    /// Builds and starts the server on top of the given session store.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport` — the contract deployed
    /// clients speak. Spawns the departure-drain task that turns expired
    /// grace periods into room broadcasts.
    pub async fn build<S: SessionStore>(
        self,
        store: S,
    ) -> Result<PointcastServer<S>, PointcastError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let (coordinator, departures) =
            Coordinator::new(store, self.registry_config);
        tokio::spawn(run_departure_drain(
            Arc::clone(&coordinator),
            departures,
        ));

        Ok(PointcastServer {
            transport,
            coordinator,
            codec: JsonCodec,
        })
    }
}

impl Default for PointcastServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Pointcast real-time server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PointcastServer<S: SessionStore> {
    transport: WebSocketTransport,
    coordinator: Arc<Coordinator<S>>,
    codec: JsonCodec,
}

impl<S: SessionStore> PointcastServer<S> {
    /// Creates a new builder.
    pub fn builder() -> PointcastServerBuilder {
        PointcastServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), PointcastError> {
        tracing::info!("Pointcast server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let coordinator = Arc::clone(&self.coordinator);
                    let codec = self.codec;
                    tokio::spawn(async move {
                        if let Err(error) =
                            handle_connection(conn, coordinator, codec)
                                .await
                        {
                            tracing::debug!(
                                %error,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(error) => {
                    tracing::error!(%error, "accept failed");
                }
            }
        }
    }
}
