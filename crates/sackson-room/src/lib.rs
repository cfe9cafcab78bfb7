//! Rooms and the game driver interface for Sackson.
//!
//! A room seats clients, relays their game messages to a [`Driver`] and
//! turns the driver's answers into events for the hub.
//!
//! # Key types
//!
//! - [`Driver`]: the trait game authors implement
//! - [`DriverRegistry`]: driver constructors by name
//! - [`Room`]: one game instance with its slots, owner and timers
//! - [`RoomState`]: lifecycle state
//! - [`Expiry`]: timer expiries reported back to the hub loop

mod driver;
mod error;
mod registry;
mod room;
mod state;

pub use driver::Driver;
pub use error::{DriverError, RoomError};
pub use registry::DriverRegistry;
pub use room::{Expiry, ExpirySender, Room, RoomInfo, RoomLinks};
pub use state::RoomState;
