//! `SacksonServer` builder and accept loop.
//!
//! This is the entry point for running a Sackson server. It ties the
//! layers together: transport → client pumps → hub → rooms.

use std::sync::Arc;

use sackson_room::{Driver, DriverRegistry};
use sackson_transport::{Transport, WebSocketConfig, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{Hub, HubHandle, SacksonError, ServerConfig};

/// Builder for configuring and starting a Sackson server.
///
/// # Example
///
/// ```rust,ignore
/// let server = SacksonServer::builder()
///     .bind("0.0.0.0:8080")
///     .driver("tic-tac-toe", || Box::new(TicTacToe::default()))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct SacksonServerBuilder {
    config: ServerConfig,
    drivers: DriverRegistry,
}

impl SacksonServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            drivers: DriverRegistry::new(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Replaces the whole configuration. Call before [`bind`](Self::bind)
    /// if both are used.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Makes a game available under `name`.
    pub fn driver<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Driver> + Send + Sync + 'static,
    {
        self.drivers.register(name, factory);
        self
    }

    /// Validates the configuration, binds the listener and starts the hub.
    pub async fn build(self) -> Result<SacksonServer, SacksonError> {
        self.config.validate()?;
        if self.drivers.is_empty() {
            tracing::warn!("no drivers registered, every create-room will fail");
        }

        let transport_config = WebSocketConfig {
            allowed_origin: self.config.allowed_origin.clone(),
            ..WebSocketConfig::default()
        };
        let transport = WebSocketTransport::bind_with(&self.config.bind, transport_config).await?;
        tracing::info!(drivers = ?self.drivers.names(), "starting hub");
        let hub = Hub::spawn(self.config.hub.clone(), self.drivers);

        Ok(SacksonServer {
            transport,
            hub,
            config: Arc::new(self.config),
        })
    }
}

impl Default for SacksonServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Sackson server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SacksonServer {
    transport: WebSocketTransport,
    hub: HubHandle,
    config: Arc<ServerConfig>,
}

impl SacksonServer {
    /// Creates a new builder.
    pub fn builder() -> SacksonServerBuilder {
        SacksonServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle to the hub, for introspection and shutdown.
    pub fn hub(&self) -> HubHandle {
        self.hub.clone()
    }

    /// Runs the server accept loop until the process is terminated.
    pub async fn run(mut self) -> Result<(), SacksonError> {
        tracing::info!(addr = %self.config.bind, "Sackson server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let hub = self.hub.clone();
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, hub, config).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
