//! # Trackbridge
//!
//! Re-emits normalized telemetry records over persistent TCP connections
//! to legacy tracking platforms, speaking each platform's wire protocol.
//!
//! Producers call one method, [`OutputRouter::forward`]. Behind it the
//! router picks the device's protocol, the registry hands out that
//! protocol's single [`Session`](trackbridge_session::Session), and the
//! session connects, logs in, writes and heartbeats as needed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trackbridge::prelude::*;
//!
//! # async fn run(record: Record) -> Result<(), BridgeError> {
//! let config = BridgeConfig::from_file("bridge.toml")?;
//! trackbridge::init_logging(&config.log_level);
//!
//! let bridge = Bridge::with_config_assignments(config);
//! let ack = bridge.router().forward(&record.device_id, &record).await?;
//! println!("sent {} bytes via {}", ack.bytes, ack.protocol);
//!
//! bridge.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod assignment;
mod bridge;
pub mod config;
mod error;
mod router;

pub use assignment::{AssignmentError, AssignmentStore, InMemoryAssignments};
pub use bridge::Bridge;
pub use config::{BridgeConfig, ConfigError, DestinationConfig, SessionSettings};
pub use error::{BridgeError, ForwardError};
pub use router::{Ack, OutputRouter};

pub use trackbridge_protocol as protocol;
pub use trackbridge_session as session;
pub use trackbridge_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. Calling this twice is a
/// no-op.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub mod prelude {
    pub use crate::{
        Ack, AssignmentStore, Bridge, BridgeConfig, BridgeError, ForwardError,
        InMemoryAssignments, OutputRouter,
    };
    pub use trackbridge_protocol::{ProtocolName, Record};
    pub use trackbridge_session::{SessionError, SessionState};
}
