//! Error types for the room layer.
//!
//! Every error that reaches a client has a stable wire code, returned by
//! `code()`. Fatal errors never reach a client: the hub destroys the room
//! instead.

use sackson_protocol::ProtocolError;

/// Errors raised by a game driver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    /// No seat left for another player.
    #[error("room is full")]
    RoomFull,

    /// A game rule rejected the request. The string is the wire code.
    #[error("rule violation: {0}")]
    Rule(String),

    /// The game has no AI, so bots can't be added.
    #[error("driver does not implement an ai")]
    NoAi,

    /// The driver's state no longer makes sense. Fatal for the room.
    #[error("inconsistent driver state: {0}")]
    Inconsistent(String),
}

impl DriverError {
    /// Shorthand for a rule violation with wire code `code`.
    pub fn rule(code: impl Into<String>) -> Self {
        Self::Rule(code.into())
    }

    pub fn code(&self) -> &str {
        match self {
            Self::RoomFull => "room_full",
            Self::Rule(code) => code,
            Self::NoAi => "does_not_implement_ai",
            Self::Inconsistent(_) => "game_panicked",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Inconsistent(_))
    }
}

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Only the owner may do this.
    #[error("only the room owner may do this")]
    Forbidden,

    /// No client sits at this player number.
    #[error("no client at player number {0}")]
    InexistentClient(usize),

    /// The owner can't be kicked.
    #[error("the owner can't be removed")]
    OwnerNotRemovable,

    #[error("the game is over")]
    GameOver,

    #[error("the game has already started")]
    GameAlreadyStarted,

    /// The client already sits in a room.
    #[error("client is already in a room")]
    AlreadyInRoom,

    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] ProtocolError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Room and driver disagree; the room can't go on.
    #[error("fatal room error: {0}")]
    Fatal(String),
}

impl RoomError {
    /// Wire code sent to the client in an `err` message.
    pub fn code(&self) -> &str {
        match self {
            Self::Forbidden => "forbidden",
            Self::InexistentClient(_) => "inexistent_client",
            Self::OwnerNotRemovable => "owner_not_removable",
            Self::GameOver => "game_over",
            Self::GameAlreadyStarted => "game_already_started",
            Self::AlreadyInRoom => "already_in_a_room",
            Self::InvalidParams(_) => "invalid_params",
            Self::Driver(e) => e.code(),
            Self::Fatal(_) => "game_panicked",
        }
    }

    /// Whether the room must be destroyed.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Fatal(_) => true,
            Self::Driver(e) => e.is_fatal(),
            _ => false,
        }
    }
}
