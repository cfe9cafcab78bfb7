/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The handshake carried an `Origin` the server doesn't accept.
    #[error("origin {0:?} not allowed")]
    OriginRejected(String),

    /// The peer sent nothing, not even a pong, within the idle window.
    #[error("peer idle for {0:?}")]
    IdleTimeout(std::time::Duration),
}
