//! Room lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The lifecycle state of a room.
///
/// ```text
/// Waiting → InProgress → Over → Destroyed
/// ```
///
/// - **Waiting**: accepting players, game not started.
/// - **InProgress**: the driver is running the game.
/// - **Over**: the driver reports the game finished. Clients still see
///   the final status until they leave or the room times out.
/// - **Destroyed**: shut down; every client has been detached.
///
/// The state is derived from the driver and the room, never stored, so
/// it can't drift from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomState {
    Waiting,
    InProgress,
    Over,
    Destroyed,
}

impl RoomState {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` while game messages are being played.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Over => write!(f, "Over"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_state_is_joinable() {
        assert!(RoomState::Waiting.is_joinable());
        assert!(!RoomState::InProgress.is_joinable());
        assert!(!RoomState::Over.is_joinable());
        assert!(!RoomState::Destroyed.is_joinable());
    }

    #[test]
    fn test_room_state_is_active() {
        assert!(!RoomState::Waiting.is_active());
        assert!(RoomState::InProgress.is_active());
        assert!(!RoomState::Over.is_active());
    }

    #[test]
    fn test_room_state_display() {
        assert_eq!(RoomState::Waiting.to_string(), "Waiting");
        assert_eq!(RoomState::InProgress.to_string(), "InProgress");
    }
}
