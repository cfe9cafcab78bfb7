//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener and a real tungstenite client to check
//! that frames, request paths and origin checks survive the network.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use sackson_transport::{
        Connection, Transport, TransportError, WebSocketConfig, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on a random port and returns the transport plus its address.
    async fn bind(config: WebSocketConfig) -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind_with("127.0.0.1:0", config)
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address").to_string();
        (transport, addr)
    }

    async fn connect_client(url: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind(WebSocketConfig::default()).await;
        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let mut client_ws = connect_client(&format!("ws://{addr}/acquire")).await;
        let server_conn = server.await.expect("task should complete");

        assert!(server_conn.id().into_inner() > 0);
        assert_eq!(server_conn.path(), "/acquire");

        // --- Server sends, client receives a text frame ---
        server_conn
            .send(br#"{"typ":"rms","cnt":{"val":[]}}"#)
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"typ":"rms","cnt":{"val":[]}}"#);

        // --- Client sends, server receives ---
        client_ws
            .send(Message::text(r#"{"typ":"cre"}"#.to_string()))
            .await
            .unwrap();
        let received = server_conn.recv().await.expect("recv should succeed");
        assert_eq!(received.as_deref(), Some(&br#"{"typ":"cre"}"#[..]));

        // --- Client closes, server sees a clean end ---
        client_ws.close(None).await.unwrap();
        let end = server_conn.recv().await.expect("clean close");
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_send_while_another_task_waits_in_recv() {
        let (mut transport, addr) = bind(WebSocketConfig::default()).await;
        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let mut client_ws = connect_client(&format!("ws://{addr}")).await;
        let conn = std::sync::Arc::new(server.await.unwrap());

        let reader = std::sync::Arc::clone(&conn);
        let pending_recv = tokio::spawn(async move { reader.recv().await });

        // The blocked reader must not stop the writer.
        tokio::time::timeout(Duration::from_secs(1), conn.send(b"ping-pong"))
            .await
            .expect("send must not wait for recv")
            .unwrap();
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"ping-pong");

        client_ws.close(None).await.unwrap();
        let _ = pending_recv.await;
    }

    #[tokio::test]
    async fn test_disallowed_origin_is_rejected() {
        let config = WebSocketConfig {
            allowed_origin: "https://play.example".to_string(),
            ..WebSocketConfig::default()
        };
        let (mut transport, addr) = bind(config).await;
        let server = tokio::spawn(async move { transport.accept().await });

        let mut request = format!("ws://{addr}").into_client_request().unwrap();
        request
            .headers_mut()
            .insert("origin", "https://evil.example".parse().unwrap());
        let client = tokio_tungstenite::connect_async(request).await;
        assert!(client.is_err(), "handshake should be refused");

        let result = server.await.unwrap();
        assert!(matches!(result, Err(TransportError::OriginRejected(origin)) if origin == "https://evil.example"));
    }

    #[tokio::test]
    async fn test_idle_peer_times_out() {
        let config = WebSocketConfig {
            idle_timeout: Duration::from_millis(50),
            ..WebSocketConfig::default()
        };
        let (mut transport, addr) = bind(config).await;
        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let _client_ws = connect_client(&format!("ws://{addr}")).await;
        let conn = server.await.unwrap();

        let result = conn.recv().await;
        assert!(matches!(result, Err(TransportError::IdleTimeout(_))));
    }
}
