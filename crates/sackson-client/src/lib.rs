//! Clients and the event plumbing between rooms and the hub.
//!
//! - **Clients** ([`Client`], [`HumanClient`], [`BotClient`],
//!   [`NullClient`]): anything that can sit in a room slot.
//! - **Turn timers** ([`Timer`]): restartable one-shot timers.
//! - **Bot plumbing** ([`Ai`], [`UpdateBuffer`]): the AI interface and
//!   the reorder buffer in front of it.
//! - **Events** ([`Event`], [`Emitter`], [`Observer`]): what happened,
//!   and who gets told.

mod ai;
mod bot;
mod buffer;
mod client;
mod error;
mod events;
mod human;
mod message;
mod null;
mod observer;
mod timer;

pub use ai::{Action, Ai, AiError};
pub use bot::{panic_message, BotClient};
pub use buffer::UpdateBuffer;
pub use client::{
    spawn_pumps, Client, ClientCore, ClientId, ClientRef, MessageSender, UnregisterSender,
};
pub use error::ClientError;
pub use events::{Emitter, Event, EventKind, EventReceiver};
pub use human::HumanClient;
pub use message::IncomingMessage;
pub use null::NullClient;
pub use observer::Observer;
pub use timer::Timer;
