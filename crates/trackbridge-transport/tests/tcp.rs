//! Integration tests for the TCP transport.
//!
//! These tests bind a real listener on loopback and verify that frames
//! written through a [`TcpConnection`] arrive byte-for-byte, and that
//! connect failures and timeouts surface as the right error variants.

#[cfg(feature = "tcp")]
mod tcp {
    use std::time::Duration;

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use trackbridge_transport::{
        Connection, Connector, TcpConnector, TransportError,
    };

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let port = listener.local_addr().expect("local addr").port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_connect_and_write_delivers_exact_bytes() {
        let (listener, port) = listener().await;

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut received = Vec::new();
            socket
                .read_to_end(&mut received)
                .await
                .expect("read to end");
            received
        });

        let connector = TcpConnector::new("127.0.0.1", port);
        let mut conn = connector.connect().await.expect("should connect");

        conn.write(&[0x78, 0x78, 0x01]).await.expect("first write");
        conn.write(b"\r\n").await.expect("second write");
        conn.close().await.expect("close");

        let received = server.await.expect("server task");
        assert_eq!(received, vec![0x78, 0x78, 0x01, 0x0D, 0x0A]);
    }

    #[tokio::test]
    async fn test_connect_refused_returns_connect_failed() {
        // Bind then drop, so the port is almost certainly closed.
        let (listener, port) = listener().await;
        drop(listener);

        let connector = TcpConnector::new("127.0.0.1", port);
        let result = connector.connect().await;

        assert!(
            matches!(result, Err(TransportError::ConnectFailed { .. })),
            "closed port should refuse the connection"
        );
    }

    #[tokio::test]
    async fn test_write_after_close_returns_closed() {
        let (listener, port) = listener().await;
        let _server = tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let mut conn = TcpConnector::new("127.0.0.1", port)
            .connect()
            .await
            .expect("should connect");
        conn.close().await.expect("close");

        let result = conn.write(b"late").await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_close_twice_is_ok() {
        let (listener, port) = listener().await;
        let _server = tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let mut conn = TcpConnector::new("127.0.0.1", port)
            .connect()
            .await
            .expect("should connect");

        conn.close().await.expect("first close");
        conn.close().await.expect("second close is a no-op");
    }

    #[tokio::test]
    async fn test_each_connection_gets_unique_id() {
        let (listener, port) = listener().await;
        let _server = tokio::spawn(async move {
            for _ in 0..2 {
                let _ = listener.accept().await;
            }
        });

        let connector = TcpConnector::new("127.0.0.1", port)
            .connect_timeout(Duration::from_secs(2));
        let a = connector.connect().await.expect("first");
        let b = connector.connect().await.expect("second");

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_endpoint_formats_host_and_port() {
        let connector = TcpConnector::new("tracker.example", 5023);
        assert_eq!(connector.endpoint(), "tracker.example:5023");
    }
}
