//! TCP transport implementation using `tokio::net::TcpStream`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::{Connection, ConnectionId, Connector, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Default bound on a single TCP handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a single frame write.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`Connector`] that dials one `host:port` over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TcpConnector {
    /// Creates a connector for `host:port` with default timeouts.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Sets the per-attempt connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-frame write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

impl Connector for TcpConnector {
    type Connection = TcpConnection;

    async fn connect(&self) -> Result<Self::Connection, TransportError> {
        let stream = match tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(&self.addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TransportError::ConnectFailed {
                    addr: self.addr.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    addr: self.addr.clone(),
                    timeout: self.connect_timeout,
                });
            }
        };

        // Frames are small and latency matters more than packing.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(addr = %self.addr, error = %e, "set_nodelay failed");
        }

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, addr = %self.addr, "opened TCP connection");

        Ok(TcpConnection {
            id,
            stream: Some(stream),
            write_timeout: self.write_timeout,
        })
    }

    fn endpoint(&self) -> String {
        self.addr.clone()
    }
}

/// A single outbound TCP connection.
pub struct TcpConnection {
    id: ConnectionId,
    stream: Option<TcpStream>,
    write_timeout: Duration,
}

impl Connection for TcpConnection {
    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;

        // `write_all` loops over partial writes until the frame is out.
        let write = async {
            stream.write_all(frame).await?;
            stream.flush().await
        };

        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::WriteFailed(e)),
            Err(_) => Err(TransportError::WriteTimeout(self.write_timeout)),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        tracing::debug!(id = %self.id, "closing TCP connection");
        stream.shutdown().await.map_err(TransportError::WriteFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
