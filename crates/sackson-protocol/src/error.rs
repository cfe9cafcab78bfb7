//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding or interpreting messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes were not a well-formed envelope.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A control message carried parameters that don't fit its type.
    #[error("invalid control parameters: {0}")]
    InvalidParams(String),
}
