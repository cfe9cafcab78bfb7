//! Codec trait and implementations for turning envelopes into bytes.
//!
//! The hub encodes every outbound envelope once per recipient and bots
//! decode what they receive, so both sides go through a [`Codec`]. Only
//! [`JsonCodec`] exists today: browsers speak JSON.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because codecs live inside long-running tasks
/// (the hub loop, bot pumps).
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use sackson_protocol::{Codec, IncomingFrame, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame: IncomingFrame = codec.decode(br#"{"typ":"joi","cnt":{"rom":"aBcDe"}}"#).unwrap();
/// assert_eq!(frame.kind, "joi");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{outgoing, ClientOut, OutgoingMessage, Reason};
    use serde_json::{json, Value};

    #[test]
    fn test_encode_typed_content_decodes_as_value() {
        let codec = JsonCodec;
        let msg = OutgoingMessage::new(
            outgoing::CLIENT_OUT,
            ClientOut {
                reason: Reason::Kicked,
            },
        );
        let bytes = codec.encode(&msg).unwrap();

        let decoded: OutgoingMessage<Value> = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.kind, "out");
        assert_eq!(decoded.sequence, None);
        assert_eq!(decoded.content, json!({"rea": "kck"}));
    }

    #[test]
    fn test_decode_garbage_is_an_error() {
        let codec = JsonCodec;
        let result: Result<OutgoingMessage, _> = codec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
