//! Error types for the client layer.

use crate::{AiError, ClientId};

/// Errors that can occur while talking to a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The outbound buffer is at capacity; the client isn't keeping up.
    #[error("outbound buffer of client {0} is full")]
    Full(ClientId),

    /// The client was closed and accepts no more messages.
    #[error("client {0} is closed")]
    Closed(ClientId),

    /// The bot's AI rejected a status update.
    #[error("ai failed: {0}")]
    Ai(#[from] AiError),

    /// The bot's AI panicked.
    #[error("ai panicked: {0}")]
    AiPanicked(String),
}
