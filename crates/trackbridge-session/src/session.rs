//! One session per destination protocol.
//!
//! A [`Session`] owns at most one live connection to its destination and
//! drives it through the connection state machine:
//!
//! ```text
//!                  send / heartbeat
//! [Disconnected] ──────────────────→ [Connecting] ──→ [LoggingIn] ──→ [Ready]
//!       ▲                                 │               │              │
//!       │          connect failed         │  login failed │  write failed│
//!       └─────────────────────────────────┴───────────────┴──────────────┘
//!
//! [any] ── close() ──→ [Closing] ──→ [Closed]
//! ```
//!
//! `LoggingIn` is skipped for protocols without a login frame.
//!
//! # Exclusion
//!
//! All mutable state sits behind one async guard. A send or a heartbeat
//! holds it from the first state check until its last frame is written,
//! so frames never interleave on the wire and only one connect attempt
//! is ever in flight per destination.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use trackbridge_protocol::{
    Built, EncodeError, FrameBuilder, ProtocolName, ProtocolState, Record,
};
use trackbridge_transport::{Connection, Connector};

use crate::backoff::{Backoff, BackoffConfig};
use crate::SessionError;

// ---------------------------------------------------------------------------
// State and configuration
// ---------------------------------------------------------------------------

/// Where a session is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection. The next send or due heartbeat will connect.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected; the login frame is being written.
    LoggingIn,
    /// Connected (and logged in, where the protocol needs it).
    Ready,
    /// `close()` is tearing the connection down.
    Closing,
    /// Terminal. Every later send fails with [`SessionError::Closed`].
    Closed,
}

/// Per-session tuning shared by every protocol.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a session may stay silent before a heartbeat is sent.
    pub idle_threshold: Duration,
    /// How often the heartbeat task checks for idleness.
    pub heartbeat_period: Duration,
    /// Connect attempts made by a single send before it gives up.
    pub connect_attempts: u32,
    /// Delay policy between failed connect attempts.
    pub backoff: BackoffConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_threshold: Duration::from_secs(180),
            heartbeat_period: Duration::from_secs(10),
            connect_attempts: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

/// What a successful [`Session::send`] put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReceipt {
    /// Location frames written (plus any companion frames).
    pub frames: usize,
    /// Total bytes written for this record.
    pub bytes: usize,
    /// `true` if this send had to (re)connect first.
    pub connected: bool,
}

/// Outcome of one heartbeat check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heartbeat {
    /// The session was idle long enough and a heartbeat frame went out.
    Sent,
    /// Recent traffic (or no traffic ever), so nothing was sent.
    NotDue,
}

/// Running counters, mainly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Successful connects, including reconnects.
    pub connects: u64,
    /// Login frames written.
    pub logins: u64,
    /// Records written.
    pub records: u64,
    /// Heartbeat frames written.
    pub heartbeats: u64,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The outbound session for one destination protocol.
///
/// Cheap to share: the registry hands out `Arc<Session<K>>` and every
/// producer calls [`send`](Self::send) concurrently.
pub struct Session<K: Connector> {
    protocol: ProtocolName,
    connector: K,
    builder: Arc<dyn FrameBuilder>,
    /// Configured login identity. Falls back to the last device seen.
    account: Option<String>,
    config: SessionConfig,
    inner: Mutex<Inner<K::Connection>>,
}

impl<K: Connector> std::fmt::Debug for Session<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("protocol", &self.protocol)
            .field("endpoint", &self.connector.endpoint())
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

struct Inner<C> {
    state: SessionState,
    conn: Option<C>,
    protocol: ProtocolState,
    last_activity: Option<Instant>,
    last_device: Option<String>,
    backoff: Backoff,
    retry_at: Option<Instant>,
    stats: SessionStats,
}

impl<K: Connector> Session<K> {
    pub fn new(
        protocol: ProtocolName,
        connector: K,
        builder: Arc<dyn FrameBuilder>,
        account: Option<String>,
        config: SessionConfig,
    ) -> Self {
        let backoff = Backoff::new(config.backoff.clone());
        Self {
            protocol,
            connector,
            builder,
            account,
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Disconnected,
                conn: None,
                protocol: ProtocolState::default(),
                last_activity: None,
                last_device: None,
                backoff,
                retry_at: None,
                stats: SessionStats::default(),
            }),
        }
    }

    pub fn protocol(&self) -> ProtocolName {
        self.protocol
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current lifecycle state. Waits for any in-flight send to finish.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn stats(&self) -> SessionStats {
        self.inner.lock().await.stats
    }

    /// The protocol counters the next frame will be built from.
    pub async fn protocol_state(&self) -> ProtocolState {
        self.inner.lock().await.protocol
    }

    /// Encodes `record` and writes it to the destination, connecting and
    /// logging in first if needed.
    ///
    /// A record the protocol cannot represent fails with
    /// [`SessionError::Encoding`] before anything else happens, so a bad
    /// record never disturbs the connection other records are using.
    pub async fn send(&self, record: &Record) -> Result<SendReceipt, SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }

        let mut built = self.builder.location(record, &inner.protocol).map_err(|e| {
            warn!(
                protocol = %self.protocol,
                device_id = %record.device_id,
                error = %e,
                "record dropped: not encodable"
            );
            SessionError::Encoding(e)
        })?;

        inner.last_device = Some(record.device_id.clone());

        let before = inner.protocol;
        let connected = self.ensure_ready(&mut inner).await?;
        if inner.protocol != before {
            // A login consumed serials; rebuild against the new counters.
            built = self.builder.location(record, &inner.protocol)?;
        }

        self.write_frames(&mut inner, &built).await?;
        inner.protocol = built.next;
        inner.last_activity = Some(Instant::now());
        inner.stats.records += 1;

        debug!(
            protocol = %self.protocol,
            device_id = %record.device_id,
            serial = before.serial,
            frames = built.frames.len(),
            "record sent"
        );

        Ok(SendReceipt {
            frames: built.frames.len(),
            bytes: built.len(),
            connected,
        })
    }

    /// Sends a heartbeat if the session has been idle for at least the
    /// configured threshold.
    ///
    /// A session that has never sent anything stays quiet: there is no
    /// identity to heartbeat with and nothing to keep alive. A session
    /// that lost its connection reconnects (and logs in) first.
    pub async fn heartbeat_if_due(&self) -> Result<Heartbeat, SessionError> {
        let mut inner = self.inner.lock().await;
        if matches!(inner.state, SessionState::Closing | SessionState::Closed) {
            return Ok(Heartbeat::NotDue);
        }

        let Some(last) = inner.last_activity else {
            return Ok(Heartbeat::NotDue);
        };
        let idle = last.elapsed();
        if idle < self.config.idle_threshold {
            return Ok(Heartbeat::NotDue);
        }

        let Some(identity) = self.identity(&inner) else {
            return Ok(Heartbeat::NotDue);
        };

        self.ensure_ready(&mut inner).await?;

        let built = self.builder.heartbeat(&identity, &inner.protocol)?;
        self.write_frames(&mut inner, &built).await?;
        inner.protocol = built.next;
        inner.last_activity = Some(Instant::now());
        inner.stats.heartbeats += 1;

        debug!(
            protocol = %self.protocol,
            idle_secs = idle.as_secs(),
            "heartbeat sent"
        );
        Ok(Heartbeat::Sent)
    }

    /// Closes the connection (if any) and moves to [`SessionState::Closed`].
    ///
    /// Idempotent. Waits for an in-flight send to finish first.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Closed {
            return;
        }

        inner.state = SessionState::Closing;
        if let Some(mut conn) = inner.conn.take() {
            if let Err(e) = conn.close().await {
                debug!(protocol = %self.protocol, error = %e, "error closing connection");
            }
        }
        inner.state = SessionState::Closed;
        info!(protocol = %self.protocol, "session closed");
    }

    // -- Internals --

    fn identity(&self, inner: &Inner<K::Connection>) -> Option<String> {
        self.account
            .clone()
            .or_else(|| inner.last_device.clone())
    }

    /// Brings the session to `Ready`. Returns `true` if it had to connect.
    async fn ensure_ready(
        &self,
        inner: &mut Inner<K::Connection>,
    ) -> Result<bool, SessionError> {
        if inner.state == SessionState::Ready && inner.conn.is_some() {
            return Ok(false);
        }

        if let Some(at) = inner.retry_at {
            let now = Instant::now();
            if now < at {
                return Err(SessionError::BackingOff { retry_in: at - now });
            }
        }

        inner.state = SessionState::Connecting;
        let mut conn = self.connect_with_backoff(inner).await?;
        inner.stats.connects += 1;

        info!(
            protocol = %self.protocol,
            endpoint = %self.connector.endpoint(),
            conn_id = %conn.id(),
            "connected"
        );

        if self.builder.requires_login() {
            inner.state = SessionState::LoggingIn;
            if let Err(e) = self.login(inner, &mut conn).await {
                let _ = conn.close().await;
                inner.state = SessionState::Disconnected;
                return Err(e);
            }
        }

        inner.conn = Some(conn);
        inner.state = SessionState::Ready;
        Ok(true)
    }

    async fn connect_with_backoff(
        &self,
        inner: &mut Inner<K::Connection>,
    ) -> Result<K::Connection, SessionError> {
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.connector.connect().await {
                Ok(conn) => {
                    inner.backoff.reset();
                    inner.retry_at = None;
                    return Ok(conn);
                }
                Err(e) => {
                    let delay = inner.backoff.next_delay();
                    warn!(
                        protocol = %self.protocol,
                        endpoint = %self.connector.endpoint(),
                        attempt,
                        attempts,
                        retry_ms = delay.as_millis() as u64,
                        error = %e,
                        "connect failed"
                    );

                    if attempt >= attempts {
                        inner.state = SessionState::Disconnected;
                        inner.retry_at = Some(Instant::now() + delay);
                        return Err(SessionError::Connect(e));
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn login(
        &self,
        inner: &mut Inner<K::Connection>,
        conn: &mut K::Connection,
    ) -> Result<(), SessionError> {
        let identity = self.identity(inner).unwrap_or_default();
        let login = self
            .builder
            .login(&identity, &inner.protocol)
            .map_err(|e: EncodeError| {
                warn!(protocol = %self.protocol, error = %e, "login frame rejected");
                SessionError::Login(e)
            })?;

        for frame in &login.frames {
            conn.write(frame).await.map_err(|e| {
                warn!(protocol = %self.protocol, error = %e, "login write failed");
                SessionError::Write(e)
            })?;
        }

        inner.protocol = login.next;
        inner.last_activity = Some(Instant::now());
        inner.stats.logins += 1;
        info!(protocol = %self.protocol, identity = %identity, "logged in");
        Ok(())
    }

    /// Writes every frame in order. On failure the connection is dropped
    /// and the session falls back to `Disconnected`.
    async fn write_frames(
        &self,
        inner: &mut Inner<K::Connection>,
        built: &Built,
    ) -> Result<(), SessionError> {
        let Some(conn) = inner.conn.as_mut() else {
            inner.state = SessionState::Disconnected;
            return Err(SessionError::Write(
                trackbridge_transport::TransportError::Closed,
            ));
        };

        for frame in &built.frames {
            if let Err(e) = conn.write(frame).await {
                warn!(
                    protocol = %self.protocol,
                    conn_id = %conn.id(),
                    error = %e,
                    "write failed, dropping connection"
                );
                inner.conn = None;
                inner.state = SessionState::Disconnected;
                return Err(SessionError::Write(e));
            }
        }
        Ok(())
    }
}
