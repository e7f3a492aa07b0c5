//! Integration tests for the WebSocket transport.
//!
//! These spin up a real WebSocket server and client to verify that frames
//! actually flow over the network, including the split-halves property the
//! coordination core relies on (a send must not wait on a pending recv).

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use pointcast_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds a transport on a random port, returning it and its address.
    async fn bind_transport() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport
            .local_addr()
            .expect("should have local addr")
            .to_string();
        (transport, addr)
    }

    async fn connect_client(addr: &str) -> ClientWs {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind_transport().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");

        assert!(server_conn.id().into_inner() > 0);

        // Server sends, client receives. JSON goes out as a text frame.
        server_conn
            .send(br#"{"event":"host-disconnected","data":{}}"#)
            .await
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        match msg {
            Message::Text(text) => {
                assert_eq!(
                    text.as_str(),
                    r#"{"event":"host-disconnected","data":{}}"#
                );
            }
            other => panic!("expected text frame, got {other:?}"),
        }

        // Client sends (text), server receives bytes.
        client_ws
            .send(Message::Text("from client".to_owned().into()))
            .await
            .unwrap();

        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"from client");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_binary_frames_accepted() {
        let (mut transport, addr) = bind_transport().await;
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws
            .send(Message::Binary(b"raw bytes".to_vec().into()))
            .await
            .unwrap();

        let received = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(received, b"raw bytes");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending() {
        // The registry's grace-period broadcasts arrive while the reader
        // task is parked in recv. A send must complete anyway.
        let (mut transport, addr) = bind_transport().await;
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = std::sync::Arc::new(server_handle.await.unwrap());

        // Park a recv with nothing inbound.
        let recv_conn = std::sync::Arc::clone(&server_conn);
        let recv_handle =
            tokio::spawn(async move { recv_conn.recv().await });

        // Give the recv task a moment to take the stream half.
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(
            Duration::from_secs(1),
            server_conn.send(b"pushed"),
        )
        .await
        .expect("send must not block on pending recv")
        .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"pushed");

        // Unblock and drain the parked recv.
        client_ws
            .send(Message::Text("done".to_owned().into()))
            .await
            .unwrap();
        let received = recv_handle.await.unwrap().unwrap().unwrap();
        assert_eq!(received, b"done");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind_transport().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }
}
