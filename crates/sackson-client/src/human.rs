//! Human clients: a person behind a WebSocket connection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use sackson_protocol::{Codec, IncomingFrame, JsonCodec};
use sackson_transport::{Connection, WebSocketConnection};
use tokio::time::{interval_at, timeout, Instant};

use crate::{Client, ClientCore, ClientRef, IncomingMessage, MessageSender, UnregisterSender};

/// Time allowed to write one message to the peer.
const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Keep-alive interval. Shorter than the transport's idle timeout so a
/// healthy peer's pongs always arrive in time.
const PING_PERIOD: Duration = Duration::from_secs(54);

/// A client driven by a remote person.
pub struct HumanClient {
    core: ClientCore,
    conn: WebSocketConnection,
    codec: JsonCodec,
}

impl HumanClient {
    /// Wraps an accepted connection. `capacity` bounds the outbound
    /// buffer; a client that falls further behind is dropped by the hub.
    pub fn new(conn: WebSocketConnection, game: impl Into<String>, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            core: ClientCore::new(game, capacity),
            conn,
            codec: JsonCodec,
        })
    }
}

impl Client for HumanClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }

    fn is_bot(&self) -> bool {
        false
    }

    fn read_pump(
        self: Arc<Self>,
        messages: MessageSender,
        unregister: UnregisterSender,
    ) -> BoxFuture<'static, ()> {
        async move {
            let me: ClientRef = self.clone();
            let conn_id = self.conn.id();
            loop {
                let data = match self.conn.recv().await {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::debug!(%conn_id, client = %self.id(), "connection closed");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, client = %self.id(), error = %e, "recv failed");
                        break;
                    }
                };
                let frame: IncomingFrame = match self.codec.decode(&data) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "ignoring undecodable frame");
                        continue;
                    }
                };
                if messages
                    .send(IncomingMessage::from_frame(me.clone(), frame))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            let _ = unregister.send(me).await;
        }
        .boxed()
    }

    fn write_pump(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            let Some(mut outbound) = self.core.take_outbound() else {
                return;
            };
            let conn_id = self.conn.id();
            let mut keepalive = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
            loop {
                tokio::select! {
                    next = outbound.recv() => {
                        let Some(bytes) = next else {
                            // Closed by the hub: say goodbye to the peer.
                            let _ = self.conn.close().await;
                            break;
                        };
                        match timeout(WRITE_WAIT, self.conn.send(&bytes)).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                tracing::debug!(%conn_id, error = %e, "write failed");
                                break;
                            }
                            Err(_) => {
                                tracing::debug!(%conn_id, "write timed out");
                                break;
                            }
                        }
                    }
                    _ = keepalive.tick() => {
                        if self.conn.ping().await.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::trace!(%conn_id, "write pump stopped");
        }
        .boxed()
    }
}
