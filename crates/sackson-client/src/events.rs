//! Events emitted by rooms, the hub and bots.
//!
//! Events are facts ("this client left that room"), not commands. Rooms
//! push them into an [`Emitter`]; the hub drains the channel after every
//! operation and hands each event to its [`Observer`](crate::Observer),
//! whose callbacks turn them into encoded messages.

use std::collections::BTreeMap;

use sackson_protocol::{PlayerData, Reason, RoomId};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::ClientRef;

/// Discriminant of an [`Event`], used as the observer's registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ClientRegistered,
    ClientUnregistered,
    ClientJoined,
    ClientOut,
    ClientsUpdated,
    GameStarted,
    GameStatusUpdated,
    RoomCreated,
    RoomDestroyed,
    Error,
    BotPanicked,
}

impl EventKind {
    /// Every kind, for wiring checks.
    pub const ALL: [EventKind; 11] = [
        EventKind::ClientRegistered,
        EventKind::ClientUnregistered,
        EventKind::ClientJoined,
        EventKind::ClientOut,
        EventKind::ClientsUpdated,
        EventKind::GameStarted,
        EventKind::GameStatusUpdated,
        EventKind::RoomCreated,
        EventKind::RoomDestroyed,
        EventKind::Error,
        EventKind::BotPanicked,
    ];
}

#[derive(Debug, Clone)]
pub enum Event {
    /// A connection was registered with the hub.
    ClientRegistered { client: ClientRef },

    /// A client left the hub for good.
    ClientUnregistered { client: ClientRef },

    /// A client took slot `number` in `room`.
    ClientJoined {
        client: ClientRef,
        room: RoomId,
        number: usize,
        owner: bool,
    },

    /// A client was detached from `room`. `reason` is `None` when the
    /// client disconnected, in which case nobody is left to notify.
    ClientOut {
        client: ClientRef,
        room: RoomId,
        reason: Option<Reason>,
    },

    /// The roster of `room` changed.
    ClientsUpdated {
        room: RoomId,
        clients: Vec<ClientRef>,
        players: BTreeMap<usize, PlayerData>,
    },

    GameStarted {
        room: RoomId,
        game: String,
        clients: Vec<ClientRef>,
        player_timeout: u64,
        game_params: Value,
    },

    /// One player's view of a room-wide status broadcast.
    GameStatusUpdated {
        client: ClientRef,
        status: Value,
        sequence: u64,
    },

    RoomCreated { room: RoomId, game: String },

    RoomDestroyed {
        room: RoomId,
        game: String,
        reason: Reason,
    },

    /// A request from `client` was rejected with a wire error `code`.
    Error { client: ClientRef, code: String },

    /// A bot's AI failed or panicked; the bot's pumps have stopped.
    BotPanicked { client: ClientRef, cause: String },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ClientRegistered { .. } => EventKind::ClientRegistered,
            Self::ClientUnregistered { .. } => EventKind::ClientUnregistered,
            Self::ClientJoined { .. } => EventKind::ClientJoined,
            Self::ClientOut { .. } => EventKind::ClientOut,
            Self::ClientsUpdated { .. } => EventKind::ClientsUpdated,
            Self::GameStarted { .. } => EventKind::GameStarted,
            Self::GameStatusUpdated { .. } => EventKind::GameStatusUpdated,
            Self::RoomCreated { .. } => EventKind::RoomCreated,
            Self::RoomDestroyed { .. } => EventKind::RoomDestroyed,
            Self::Error { .. } => EventKind::Error,
            Self::BotPanicked { .. } => EventKind::BotPanicked,
        }
    }
}

/// Receiving end of an [`Emitter`].
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Cloneable sending end of the event channel.
///
/// Emitting never blocks. Events emitted after the hub is gone are
/// dropped.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<Event>,
}

impl Emitter {
    /// Creates a connected emitter/receiver pair.
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(kind = ?e.0.kind(), "event dropped, receiver gone");
        }
    }
}
