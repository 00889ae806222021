//! Error types for routing and the top-level bridge.

use trackbridge_protocol::EncodeError;
use trackbridge_session::SessionError;
use trackbridge_transport::TransportError;

use crate::assignment::AssignmentError;
use crate::config::ConfigError;

/// Why a [`forward`](crate::OutputRouter::forward) call failed.
///
/// Callers use [`is_encoding`](Self::is_encoding) and
/// [`is_transport`](Self::is_transport) to decide what to do with the
/// record: an encoding failure will never succeed on resubmission, a
/// transport failure might.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The record cannot be represented in the destination protocol.
    #[error("record dropped: {0}")]
    Encoding(#[source] EncodeError),

    /// The destination session could not take the record.
    #[error(transparent)]
    Session(SessionError),

    /// The assignment store failed and no default protocol is configured.
    #[error("assignment lookup failed: {0}")]
    AssignmentLookup(#[source] AssignmentError),

    /// The device has no assignment and no default protocol is configured.
    #[error("no protocol assigned to device {0:?} and no default configured")]
    NoRoute(String),
}

impl ForwardError {
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Session(e) if e.is_transport())
    }
}

impl From<SessionError> for ForwardError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Encoding(e) => Self::Encoding(e),
            other => Self::Session(other),
        }
    }
}

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` attributes let `?` lift any layer's error into this one.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}
