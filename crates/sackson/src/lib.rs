//! # Sackson
//!
//! Session server for turn-based board games played over WebSockets.
//!
//! Game authors implement the [`Driver`] trait (and optionally [`Ai`] for
//! bots); the server handles connections, rooms, turn timers and status
//! delivery.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sackson::prelude::*;
//!
//! // Implement Driver for your game, then:
//! // let server = SacksonServer::builder()
//! //     .bind("0.0.0.0:8080")
//! //     .driver("my-game", || Box::new(MyGame::default()))
//! //     .build()
//! //     .await?;
//! // server.run().await
//! ```

mod config;
mod error;
mod handler;
mod handlers;
mod hub;
mod logging;
mod server;

pub use config::{HubConfig, ServerConfig};
pub use error::{HubError, SacksonError};
pub use hub::{Hub, HubHandle, HubState};
pub use logging::init_logging;
pub use server::{SacksonServer, SacksonServerBuilder};

pub use sackson_client::{Action, Ai, AiError, Client, ClientRef, IncomingMessage, NullClient};
pub use sackson_protocol::{Reason, RoomId};
pub use sackson_room::{Driver, DriverError, DriverRegistry, RoomInfo, RoomState};

/// Everything a game binary usually needs.
pub mod prelude {
    pub use crate::{
        init_logging, Action, Ai, AiError, Driver, DriverError, SacksonError, SacksonServer,
        ServerConfig,
    };
}
