//! Transport abstraction layer for Trackbridge.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how a byte stream to a destination server is opened and written. The
//! session layer only ever talks to these traits, which lets tests swap
//! the real socket for an in-process fake.
//!
//! # Feature Flags
//!
//! - `tcp` (default): plain TCP transport via `tokio::net::TcpStream`

mod error;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::TransportError;
#[cfg(feature = "tcp")]
pub use tcp::{TcpConnection, TcpConnector};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opens new outbound connections to one fixed destination.
///
/// A connector is cheap to construct and does no I/O until
/// [`connect`](Connector::connect) is called.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Opens a connection, giving up after the connector's own timeout.
    fn connect(
        &self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Human-readable destination, used in logs.
    fn endpoint(&self) -> String;
}

/// A single outbound connection that frames are written to.
pub trait Connection: Send + 'static {
    /// Writes the whole frame or fails.
    ///
    /// Implementations retry partial writes internally, so a caller never
    /// observes half a frame on the wire followed by success.
    fn write(
        &mut self,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the connection.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
