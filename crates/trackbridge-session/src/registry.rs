//! The session registry: one session per destination protocol.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use trackbridge_protocol::{FrameBuilder, ProtocolName};
use trackbridge_transport::Connector;

use crate::{heartbeat, Session, SessionConfig, SessionError};

/// Everything needed to open a session to one destination.
pub struct Destination<K> {
    pub connector: K,
    pub builder: Arc<dyn FrameBuilder>,
    /// Login identity. `None` means "use the device id of the last record".
    pub account: Option<String>,
}

/// Maps each protocol to its single [`Session`], created on first use.
///
/// Lookups take a shared read lock; only the first lookup for a protocol
/// takes the write lock, and it re-checks before creating so two racing
/// callers always end up with the same session.
///
/// ```text
/// get(gt06) ──→ [read: miss] ──→ [write: re-check, create, spawn heartbeat]
/// get(gt06) ──→ [read: hit] ──→ same Arc<Session>
/// shutdown() ──→ stop heartbeats ──→ close every session
/// ```
pub struct SessionRegistry<K: Connector> {
    destinations: HashMap<ProtocolName, Destination<K>>,
    config: SessionConfig,
    sessions: RwLock<HashMap<ProtocolName, Arc<Session<K>>>>,
    heartbeats: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl<K: Connector + Clone> SessionRegistry<K> {
    pub fn new(
        destinations: HashMap<ProtocolName, Destination<K>>,
        config: SessionConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            destinations,
            config,
            sessions: RwLock::new(HashMap::new()),
            heartbeats: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    /// Returns the session for `protocol`, creating it on first use.
    ///
    /// Creating a session also starts its heartbeat task, so this must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    /// - [`SessionError::UnknownProtocol`] if no destination is configured
    /// - [`SessionError::Closed`] after [`shutdown`](Self::shutdown)
    pub fn get(&self, protocol: ProtocolName) -> Result<Arc<Session<K>>, SessionError> {
        if let Some(session) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&protocol)
        {
            return Ok(Arc::clone(session));
        }

        let destination = self
            .destinations
            .get(&protocol)
            .ok_or(SessionError::UnknownProtocol(protocol))?;

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(session) = sessions.get(&protocol) {
            return Ok(Arc::clone(session));
        }
        if *self.shutdown.borrow() {
            return Err(SessionError::Closed);
        }

        let session = Arc::new(Session::new(
            protocol,
            destination.connector.clone(),
            Arc::clone(&destination.builder),
            destination.account.clone(),
            self.config.clone(),
        ));

        let handle = heartbeat::spawn(Arc::clone(&session), self.shutdown.subscribe());
        self.heartbeats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);

        sessions.insert(protocol, Arc::clone(&session));
        info!(
            %protocol,
            endpoint = %destination.connector.endpoint(),
            "session created"
        );
        Ok(session)
    }

    /// `true` if a destination is configured for `protocol`.
    pub fn is_configured(&self, protocol: ProtocolName) -> bool {
        self.destinations.contains_key(&protocol)
    }

    /// Protocols that have a destination, in a stable order.
    pub fn configured(&self) -> Vec<ProtocolName> {
        let mut protocols: Vec<_> = self.destinations.keys().copied().collect();
        protocols.sort_by_key(|p| p.as_str());
        protocols
    }

    /// Number of sessions created so far.
    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stops every heartbeat task and closes every session.
    ///
    /// After this, [`get`](Self::get) fails with [`SessionError::Closed`]
    /// for protocols that had no session yet, and sends through existing
    /// sessions fail the same way.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        let handles: Vec<_> = self
            .heartbeats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.await;
        }

        let sessions: Vec<_> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for session in sessions {
            session.close().await;
        }

        info!("session registry shut down");
    }
}
