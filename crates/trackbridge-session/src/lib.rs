//! Destination sessions for Trackbridge.
//!
//! This crate keeps one long-lived connection per destination protocol
//! alive and correctly sequenced:
//!
//! 1. **Registry** ([`SessionRegistry`]): one [`Session`] per protocol,
//!    created lazily and shared by every producer
//! 2. **Session** ([`Session`]): connect, login, send, heartbeat and
//!    close, all under one async guard
//! 3. **Backoff** ([`Backoff`]): bounded, jittered delays between failed
//!    connect attempts
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (above)       ← picks a protocol per device, calls Session::send
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol + Transport (below) ← frame bytes, TCP connections
//! ```

mod backoff;
mod error;
mod heartbeat;
mod registry;
mod session;

pub use backoff::{Backoff, BackoffConfig};
pub use error::SessionError;
pub use registry::{Destination, SessionRegistry};
pub use session::{
    Heartbeat, SendReceipt, Session, SessionConfig, SessionState, SessionStats,
};
