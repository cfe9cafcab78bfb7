//! Parameter and payload structs for the control vocabulary.
//!
//! Field names follow the three-letter wire convention through
//! `#[serde(rename)]`; the Rust side uses readable names.

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{ProtocolError, Reason, RoomId};

/// Decodes a control message's content into its parameter struct.
///
/// A missing content (`null`) is treated as an empty object, so parameter
/// structs whose fields are all optional accept bare messages like
/// `{"typ":"qui"}`.
pub fn decode_params<T: DeserializeOwned>(content: &Value) -> Result<T, ProtocolError> {
    let result = if content.is_null() {
        serde_json::from_value(Value::Object(Default::default()))
    } else {
        T::deserialize(content)
    };
    result.map_err(|e| ProtocolError::InvalidParams(e.to_string()))
}

// ---------------------------------------------------------------------------
// Inbound parameters
// ---------------------------------------------------------------------------

/// `cre`: create a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateRoomParams {
    /// Driver to run; defaults to the client's game.
    #[serde(rename = "drv", default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// New display name for the creator.
    #[serde(rename = "nam", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `joi`: join an existing room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomParams {
    #[serde(rename = "rom")]
    pub room: RoomId,
    #[serde(rename = "nam", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `ini`: start the game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartGameParams {
    /// Seconds each player has to move. Zero disables turn timers.
    #[serde(rename = "pto", default)]
    pub player_timeout: u64,
    /// Driver-specific game parameters, echoed to clients.
    #[serde(rename = "gpa", default)]
    pub game_params: Value,
}

/// `bot`: add a bot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddBotParams {
    #[serde(rename = "lvl", default)]
    pub level: String,
}

/// `kck`: kick a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickPlayerParams {
    #[serde(rename = "ply")]
    pub player_number: usize,
}

/// `scd`: update the sender's client data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetClientDataParams {
    #[serde(rename = "nam")]
    pub name: String,
}

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

/// `out`: the client was detached from its room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientOut {
    #[serde(rename = "rea")]
    pub reason: Reason,
}

/// `rms`: rooms waiting for players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomsList {
    #[serde(rename = "val")]
    pub rooms: Vec<RoomId>,
}

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    #[serde(rename = "nam")]
    pub name: String,
    #[serde(rename = "own")]
    pub owner: bool,
    #[serde(rename = "bot")]
    pub bot: bool,
}

/// `pls`: roster keyed by player number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPlayers {
    #[serde(rename = "val")]
    pub players: BTreeMap<usize, PlayerData>,
}

/// `err`: a request was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    #[serde(rename = "des")]
    pub code: String,
}

/// `joi`: the client joined a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRoom {
    #[serde(rename = "num")]
    pub number: usize,
    #[serde(rename = "id")]
    pub room: RoomId,
    #[serde(rename = "own")]
    pub owner: bool,
}

/// `gst`: the game started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStarted {
    #[serde(rename = "pto")]
    pub player_timeout: u64,
    #[serde(rename = "gpa")]
    pub game_params: Value,
}
