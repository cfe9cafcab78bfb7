//! Core protocol types for Sackson's wire format.
//!
//! Every message that crosses the wire is a small JSON object with a
//! three-letter type tag (`typ`) and an opaque content payload (`cnt`).
//! Status broadcasts additionally carry a per-room sequence number (`seq`)
//! so receivers can put them back in order.
//!
//! ```text
//! client → server   { "typ": "joi", "cnt": { "rom": "aBcDe" } }
//! server → client   { "typ": "upd", "seq": 4, "cnt": { ...driver status... } }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a room: a short random code such as `"kXpQa"`.
///
/// Serialized transparently, so a `RoomId` is just a JSON string on the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

// ---------------------------------------------------------------------------
// Control vocabulary
// ---------------------------------------------------------------------------

/// Message types the server interprets itself instead of forwarding to a
/// game driver.
///
/// Anything that doesn't parse as a `Control` is a game message and goes to
/// the driver untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    CreateRoom,
    JoinRoom,
    TerminateRoom,
    StartGame,
    AddBot,
    KickPlayer,
    PlayerQuits,
    SetClientData,
}

impl Control {
    /// Every control type, hub-level first.
    pub const ALL: [Control; 8] = [
        Control::CreateRoom,
        Control::JoinRoom,
        Control::TerminateRoom,
        Control::StartGame,
        Control::AddBot,
        Control::KickPlayer,
        Control::PlayerQuits,
        Control::SetClientData,
    ];

    /// Looks up a control type by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    /// The wire tag of this control type.
    pub fn tag(self) -> &'static str {
        match self {
            Self::CreateRoom => "cre",
            Self::JoinRoom => "joi",
            Self::TerminateRoom => "ter",
            Self::StartGame => "ini",
            Self::AddBot => "bot",
            Self::KickPlayer => "kck",
            Self::PlayerQuits => "qui",
            Self::SetClientData => "scd",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Tags of server → client messages.
pub mod outgoing {
    /// Sequenced driver status for one player.
    pub const UPDATE: &str = "upd";
    /// The client was detached from its room.
    pub const CLIENT_OUT: &str = "out";
    /// Ids of the rooms still waiting for players.
    pub const ROOMS_LIST: &str = "rms";
    /// Roster of the client's room.
    pub const CURRENT_PLAYERS: &str = "pls";
    /// A request was rejected.
    pub const ERROR: &str = "err";
    /// The client joined a room.
    pub const JOINED_ROOM: &str = "joi";
    /// The room's game has started.
    pub const GAME_STARTED: &str = "gst";
}

// ---------------------------------------------------------------------------
// Reason codes
// ---------------------------------------------------------------------------

/// Why a client was detached from a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    /// The room's idle timer fired.
    #[serde(rename = "tim")]
    RoomTimeout,
    /// The owner terminated the room (or the server shut down).
    #[serde(rename = "ter")]
    Terminated,
    /// No human clients were left in the room.
    #[serde(rename = "ncl")]
    NoClients,
    /// The game driver failed unrecoverably.
    #[serde(rename = "pan")]
    GamePanicked,
    /// The player did not move before the turn timer fired.
    #[serde(rename = "ptm")]
    PlayerTimedOut,
    /// The owner kicked the player.
    #[serde(rename = "kck")]
    Kicked,
    /// The player left on their own.
    #[serde(rename = "qui")]
    Quit,
}

impl Reason {
    /// The wire code of this reason.
    pub fn code(self) -> &'static str {
        match self {
            Self::RoomTimeout => "tim",
            Self::Terminated => "ter",
            Self::NoClients => "ncl",
            Self::GamePanicked => "pan",
            Self::PlayerTimedOut => "ptm",
            Self::Kicked => "kck",
            Self::Quit => "qui",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// A client → server frame, as decoded straight off the transport.
///
/// `content` stays an untyped JSON value; control handlers decode it into
/// their parameter structs and game messages hand it to the driver as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingFrame {
    #[serde(rename = "typ")]
    pub kind: String,
    #[serde(rename = "cnt", default)]
    pub content: Value,
}

impl IncomingFrame {
    /// Builds a frame from a type tag and content.
    pub fn new(kind: impl Into<String>, content: Value) -> Self {
        Self {
            kind: kind.into(),
            content,
        }
    }
}

/// A server → client envelope.
///
/// Generic over the content so senders can serialize typed payloads
/// directly while receivers (bots, tests) decode into `Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage<T = Value> {
    #[serde(rename = "typ")]
    pub kind: String,
    /// Present only on room status broadcasts.
    #[serde(rename = "seq", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(rename = "cnt")]
    pub content: T,
}

impl<T> OutgoingMessage<T> {
    /// An unsequenced message.
    pub fn new(kind: &str, content: T) -> Self {
        Self {
            kind: kind.to_string(),
            sequence: None,
            content,
        }
    }

    /// A sequenced status broadcast.
    pub fn update(sequence: u64, content: T) -> Self {
        Self {
            kind: outgoing::UPDATE.to_string(),
            sequence: Some(sequence),
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_control_tags_round_trip() {
        for control in Control::ALL {
            assert_eq!(Control::from_tag(control.tag()), Some(control));
        }
        assert_eq!(Control::from_tag("mov"), None);
    }

    #[test]
    fn test_join_tag_is_shared_by_both_directions() {
        assert_eq!(Control::JoinRoom.tag(), outgoing::JOINED_ROOM);
    }

    #[test]
    fn test_reason_serializes_as_code() {
        assert_eq!(serde_json::to_value(Reason::GamePanicked).unwrap(), json!("pan"));
        assert_eq!(Reason::PlayerTimedOut.to_string(), "ptm");
        let parsed: Reason = serde_json::from_value(json!("kck")).unwrap();
        assert_eq!(parsed, Reason::Kicked);
    }

    #[test]
    fn test_room_id_is_transparent() {
        let id = RoomId::from("aBcDe");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("aBcDe"));
        assert_eq!(id.to_string(), "aBcDe");
    }

    #[test]
    fn test_incoming_frame_without_content_defaults_to_null() {
        let frame: IncomingFrame = serde_json::from_str(r#"{"typ":"qui"}"#).unwrap();
        assert_eq!(frame.kind, "qui");
        assert!(frame.content.is_null());
    }

    #[test]
    fn test_outgoing_sequence_is_omitted_when_absent() {
        let msg = OutgoingMessage::new(outgoing::ERROR, json!({"des": "forbidden"}));
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded, json!({"typ": "err", "cnt": {"des": "forbidden"}}));

        let update = OutgoingMessage::update(3, json!({"board": []}));
        let encoded = serde_json::to_value(&update).unwrap();
        assert_eq!(encoded["seq"], json!(3));
        assert_eq!(encoded["typ"], json!("upd"));
    }
}
