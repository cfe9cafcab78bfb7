//! Tracing subscriber setup for binaries.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::SacksonError;

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_level: &str) -> Result<(), SacksonError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| SacksonError::Logging(e.to_string()))
}
