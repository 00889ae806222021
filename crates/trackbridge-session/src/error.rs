//! Error types for the session layer.

use std::time::Duration;

use trackbridge_protocol::{EncodeError, ProtocolName};
use trackbridge_transport::TransportError;

/// Errors that can occur while sending through a session.
///
/// The variants split into two families that callers treat differently:
/// an [`Encoding`](SessionError::Encoding) error is about one record and
/// resubmitting it will fail the same way; every transport-flavoured
/// variant is about the destination and the same record may succeed later.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The record cannot be represented in this protocol. It was dropped;
    /// the session and its connection are untouched.
    #[error("record dropped: {0}")]
    Encoding(#[from] EncodeError),

    /// Every connect attempt of this send failed. The session is
    /// `Disconnected` and will try again on the next send or heartbeat.
    #[error("connect failed: {0}")]
    Connect(#[source] TransportError),

    /// A frame write failed. The connection was discarded.
    #[error("write failed: {0}")]
    Write(#[source] TransportError),

    /// The login frame could not be built from the session identity.
    #[error("login frame could not be built: {0}")]
    Login(#[source] EncodeError),

    /// A recent connect failure is still inside its backoff window.
    #[error("reconnect backing off, next attempt in {retry_in:?}")]
    BackingOff { retry_in: Duration },

    /// The session was shut down.
    #[error("session closed")]
    Closed,

    /// No destination is configured for this protocol.
    #[error("no destination configured for protocol {0}")]
    UnknownProtocol(ProtocolName),
}

impl SessionError {
    /// `true` if the record itself was the problem.
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }

    /// `true` if the destination was unreachable or failed mid-write.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Write(_) | Self::BackingOff { .. }
        )
    }
}
