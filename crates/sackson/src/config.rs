//! Server and hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SacksonError;

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Settings for the hub event loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Lifetime of a room from creation. When it runs out the room is
    /// destroyed with reason "room timeout".
    pub room_timeout: Duration,

    /// Messages buffered per client before the client counts as
    /// unreachable and is dropped.
    pub outbound_capacity: usize,

    /// Capacity of the register, unregister and message channels.
    pub channel_capacity: usize,

    /// Seed for room ids. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            room_timeout: Duration::from_secs(30 * 60),
            outbound_capacity: 256,
            channel_capacity: 1024,
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Top-level server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,

    /// Accepted `Origin` header. `*` accepts any.
    pub allowed_origin: String,

    /// Game of clients connecting on `/`.
    pub default_game: String,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    pub debug: bool,

    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            allowed_origin: "*".to_string(),
            default_game: "default".to_string(),
            debug: false,
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Rejects settings the server can't run with.
    pub fn validate(&self) -> Result<(), SacksonError> {
        if self.bind.trim().is_empty() {
            return Err(SacksonError::Config("bind address is empty".into()));
        }
        if self.hub.outbound_capacity == 0 {
            return Err(SacksonError::Config("outbound_capacity must be positive".into()));
        }
        if self.hub.channel_capacity == 0 {
            return Err(SacksonError::Config("channel_capacity must be positive".into()));
        }
        Ok(())
    }

    /// Default log filter for [`init_logging`](crate::init_logging).
    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hub.room_timeout, Duration::from_secs(1800));
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_validate_rejects_empty_bind() {
        let config = ServerConfig {
            bind: "  ".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(SacksonError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = ServerConfig::default();
        config.hub.outbound_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"default_game":"acquire","debug":true}"#).unwrap();
        assert_eq!(config.default_game, "acquire");
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.hub, HubConfig::default());
    }
}
