//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each accepted stream is split into a read half and a write half behind
//! separate locks, so a client's read pump can sit in `recv` while its
//! write pump keeps sending.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Accept-time settings for [`WebSocketTransport`].
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Value the `Origin` header must match. `*` accepts any origin.
    /// Requests without an `Origin` header (non-browser clients) are
    /// always accepted.
    pub allowed_origin: String,
    /// How long `recv` waits for any frame, pongs included, before giving
    /// up on the peer.
    pub idle_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            allowed_origin: "*".to_string(),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport with default settings.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with(addr, WebSocketConfig::default()).await
    }

    /// Binds a new WebSocket transport with the given settings.
    pub async fn bind_with(addr: &str, config: WebSocketConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, origin = %config.allowed_origin, "WebSocket transport listening");
        Ok(Self { listener, config })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Checks a handshake's `Origin` header against the allowed value.
fn origin_allowed(allowed: &str, origin: Option<&str>) -> bool {
    match origin {
        None => true,
        Some(origin) => allowed == "*" || allowed == origin,
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let mut path = String::new();
        let mut rejected: Option<String> = None;
        let allowed = self.config.allowed_origin.as_str();

        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            path = req.uri().path().to_string();
            let origin = req
                .headers()
                .get("origin")
                .and_then(|value| value.to_str().ok());
            if origin_allowed(allowed, origin) {
                return Ok(resp);
            }
            rejected = origin.map(str::to_string);
            let mut refusal = ErrorResponse::new(Some("origin not allowed".to_string()));
            *refusal.status_mut() = StatusCode::FORBIDDEN;
            Err(refusal)
        };

        let handshake = tokio_tungstenite::accept_hdr_async(stream, callback).await;
        if let Some(origin) = rejected {
            tracing::warn!(%addr, %origin, "rejected WebSocket handshake");
            return Err(TransportError::OriginRejected(origin));
        }
        let ws = handshake.map_err(|e| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, %path, "accepted WebSocket connection");

        let (writer, reader) = ws.split();
        Ok(WebSocketConnection {
            id,
            path,
            idle_timeout: self.config.idle_timeout,
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A single WebSocket connection with independently locked halves.
pub struct WebSocketConnection {
    id: ConnectionId,
    path: String,
    idle_timeout: Duration,
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
}

fn broken_pipe(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> TransportError {
    TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        // JSON envelopes go out as text frames so browsers get strings.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_string()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.writer.lock().await.send(msg).await.map_err(broken_pipe)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        loop {
            let next = tokio::time::timeout(self.idle_timeout, reader.next())
                .await
                .map_err(|_| TransportError::IdleTimeout(self.idle_timeout))?;
            match next {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Pings, pongs and raw frames only prove the peer is alive.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(broken_pipe)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer.lock().await.close().await.map_err(broken_pipe)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn path(&self) -> &str {
        &self.path
    }
}
