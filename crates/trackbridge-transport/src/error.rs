use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The TCP handshake was refused or failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The TCP handshake did not complete in time.
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// Writing a frame failed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// The peer stopped accepting bytes and the write stalled.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// The connection was already closed.
    #[error("connection closed")]
    Closed,
}
