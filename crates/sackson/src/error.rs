//! Unified error types for the Sackson server.

use sackson_client::ClientError;
use sackson_protocol::{ProtocolError, RoomId};
use sackson_room::RoomError;
use sackson_transport::TransportError;

/// Why the hub rejected a request. Sent to the author as an `err`
/// message carrying [`code`](HubError::code).
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("room {0} does not exist")]
    InexistentRoom(RoomId),

    #[error("no driver named {0:?}")]
    InexistentDriver(String),

    #[error("client is not in a room")]
    NotInARoom,

    #[error("client is already in a room")]
    AlreadyInARoom,

    /// Only the owner may do this.
    #[error("only the room owner may do this")]
    Forbidden,

    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] ProtocolError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// The hub loop has stopped.
    #[error("hub is not running")]
    Closed,
}

impl HubError {
    /// Wire code sent to the client.
    pub fn code(&self) -> &str {
        match self {
            Self::InexistentRoom(_) => "inexistent_room",
            Self::InexistentDriver(_) => "inexistent_driver",
            Self::NotInARoom => "not_in_a_room",
            Self::AlreadyInARoom => "already_in_a_room",
            Self::Forbidden => "forbidden",
            Self::InvalidParams(_) => "invalid_params",
            Self::Room(e) => e.code(),
            Self::Closed => "server_shutting_down",
        }
    }
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SacksonError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad parameters).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A client-level error (full or closed outbound channel).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A room-level error.
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Hub(#[from] HubError),

    /// The server configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The global tracing subscriber could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let sackson_err: SacksonError = err.into();
        assert!(matches!(sackson_err, SacksonError::Transport(_)));
        assert!(sackson_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::Forbidden;
        let sackson_err: SacksonError = err.into();
        assert!(matches!(sackson_err, SacksonError::Room(_)));
    }

    #[test]
    fn test_from_hub_error() {
        let sackson_err: SacksonError = HubError::Closed.into();
        assert!(matches!(sackson_err, SacksonError::Hub(HubError::Closed)));
    }

    #[test]
    fn test_hub_error_codes() {
        assert_eq!(HubError::InexistentRoom(RoomId::from("NOPE")).code(), "inexistent_room");
        assert_eq!(HubError::InexistentDriver("go".into()).code(), "inexistent_driver");
        assert_eq!(HubError::NotInARoom.code(), "not_in_a_room");
        assert_eq!(HubError::AlreadyInARoom.code(), "already_in_a_room");
        assert_eq!(HubError::Room(RoomError::GameOver).code(), "game_over");
        let invalid: HubError = ProtocolError::InvalidParams("rom".into()).into();
        assert_eq!(invalid.code(), "invalid_params");
    }
}
