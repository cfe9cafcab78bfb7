//! Per-connection handler.
//!
//! Each accepted connection gets its own Tokio task running this handler:
//!   1. Pick the game from the request path
//!   2. Wrap the connection in a `HumanClient` and register it
//!   3. Spawn the write pump, then run the read pump until the peer leaves

use std::sync::Arc;

use sackson_client::{Client, ClientRef, HumanClient};
use sackson_transport::{Connection, WebSocketConnection};

use crate::{HubHandle, SacksonError, ServerConfig};

/// Game tag for a request path: `/acquire` → `acquire`, `/` → the default.
pub(crate) fn game_for_path(path: &str, default_game: &str) -> String {
    let game = path.trim_start_matches('/').trim_end_matches('/');
    if game.is_empty() {
        default_game.to_string()
    } else {
        game.to_string()
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    hub: HubHandle,
    config: Arc<ServerConfig>,
) -> Result<(), SacksonError> {
    let conn_id = conn.id();
    let game = game_for_path(conn.path(), &config.default_game);
    tracing::debug!(%conn_id, game = %game, "handling new connection");

    let client = HumanClient::new(conn, game, config.hub.outbound_capacity);
    let client_ref: ClientRef = client.clone();
    hub.register(client_ref).await?;

    tokio::spawn(Arc::clone(&client).write_pump());
    client.read_pump(hub.messages(), hub.unregister_sender()).await;

    tracing::debug!(%conn_id, "connection handler finished");
    Ok(())
}
