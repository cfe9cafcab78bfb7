//! Wire protocol for Sackson.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`IncomingFrame`], [`OutgoingMessage`], [`Control`],
//!   [`Reason`], [`RoomId`]): envelopes and the control vocabulary.
//! - **Messages** ([`CreateRoomParams`], [`ClientOut`], ...): the typed
//!   content of control messages and server notifications.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, bytes out.
//!
//! Game payloads stay opaque `serde_json::Value`s all the way to the
//! driver; the protocol layer never looks inside them.

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{
    decode_params, AddBotParams, ClientOut, CreateRoomParams, CurrentPlayers, ErrorMessage,
    GameStarted, JoinRoomParams, JoinedRoom, KickPlayerParams, PlayerData, RoomsList,
    SetClientDataParams, StartGameParams,
};
pub use types::{outgoing, Control, IncomingFrame, OutgoingMessage, Reason, RoomId};
