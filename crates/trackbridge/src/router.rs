//! The output router: the single entry point every producer calls.
//!
//! ```text
//! forward(device, record)
//!     │
//!     ├─ assignment store ── Some(p) ──→ p
//!     │                  └─ None / Err ─→ default protocol (if any)
//!     ▼
//! registry.get(p) ──→ session.send(record)
//! ```
//!
//! The router holds no mutable state. Concurrency and ordering are the
//! session's business.

use std::sync::Arc;

use tracing::{debug, warn};
use trackbridge_protocol::{ProtocolName, Record};
use trackbridge_session::SessionRegistry;
use trackbridge_transport::{Connector, TcpConnector};

use crate::assignment::AssignmentStore;
use crate::error::ForwardError;

/// What a successful [`OutputRouter::forward`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// The protocol the record went out on.
    pub protocol: ProtocolName,
    /// Frames written for this record.
    pub frames: usize,
    /// Bytes written for this record.
    pub bytes: usize,
}

/// Routes records to the session of each device's assigned protocol.
pub struct OutputRouter<S, K: Connector = TcpConnector> {
    registry: Arc<SessionRegistry<K>>,
    store: S,
    default_protocol: Option<ProtocolName>,
}

impl<S: AssignmentStore, K: Connector + Clone> OutputRouter<S, K> {
    pub fn new(
        registry: Arc<SessionRegistry<K>>,
        store: S,
        default_protocol: Option<ProtocolName>,
    ) -> Self {
        Self {
            registry,
            store,
            default_protocol,
        }
    }

    /// Sends `record` to the destination assigned to `device_id`.
    ///
    /// Safe to call concurrently from any number of tasks.
    pub async fn forward(&self, device_id: &str, record: &Record) -> Result<Ack, ForwardError> {
        let protocol = self.resolve(device_id).await?;
        let session = self.registry.get(protocol)?;

        let receipt = session.send(record).await.map_err(|e| {
            debug!(%protocol, device_id, error = %e, "forward failed");
            ForwardError::from(e)
        })?;

        Ok(Ack {
            protocol,
            frames: receipt.frames,
            bytes: receipt.bytes,
        })
    }

    /// Decides which protocol `device_id` reports through.
    ///
    /// A store failure is survivable when a default protocol exists.
    pub async fn resolve(&self, device_id: &str) -> Result<ProtocolName, ForwardError> {
        match self.store.assigned_protocol(device_id).await {
            Ok(Some(protocol)) => Ok(protocol),
            Ok(None) => self
                .default_protocol
                .ok_or_else(|| ForwardError::NoRoute(device_id.to_string())),
            Err(e) => match self.default_protocol {
                Some(protocol) => {
                    warn!(
                        device_id,
                        fallback = %protocol,
                        error = %e,
                        "assignment lookup failed, using default protocol"
                    );
                    Ok(protocol)
                }
                None => Err(ForwardError::AssignmentLookup(e)),
            },
        }
    }

    pub fn default_protocol(&self) -> Option<ProtocolName> {
        self.default_protocol
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SessionRegistry<K>> {
        &self.registry
    }
}
