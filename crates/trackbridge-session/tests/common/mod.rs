//! Shared test doubles for the session tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::time::Instant;
use trackbridge_protocol::Record;
use trackbridge_session::{BackoffConfig, SessionConfig};
use trackbridge_transport::{Connection, ConnectionId, Connector, TransportError};

// =========================================================================
// Fake connector
// =========================================================================

/// A connector that records every write instead of touching the network.
///
/// Writes are appended to a shared byte stream in small chunks with a
/// yield between each, so two unguarded writers would visibly interleave.
#[derive(Clone, Default)]
pub struct FakeConnector {
    pub shared: Arc<Shared>,
}

#[derive(Default)]
pub struct Shared {
    frames: Mutex<Vec<(ConnectionId, Vec<u8>)>>,
    wire: Mutex<Vec<u8>>,
    attempts: Mutex<Vec<Instant>>,
    next_id: AtomicU64,
    connects: AtomicUsize,
    closes: AtomicUsize,
    refuse_next: AtomicUsize,
    refuse_all: AtomicBool,
    fail_next_write: AtomicBool,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `n` connect attempts.
    pub fn refuse_next(&self, n: usize) {
        self.shared.refuse_next.store(n, Ordering::SeqCst);
    }

    /// Refuse every connect attempt until called again with `false`.
    pub fn refuse_all(&self, refuse: bool) {
        self.shared.refuse_all.store(refuse, Ordering::SeqCst);
    }

    /// Fail the next write on whichever connection makes it.
    pub fn fail_next_write(&self) {
        self.shared.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Every successfully written frame, in order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.shared
            .frames
            .lock()
            .unwrap()
            .iter()
            .map(|(_, f)| f.clone())
            .collect()
    }

    /// Every successfully written frame with the connection it went out on.
    pub fn frames_by_connection(&self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.shared.frames.lock().unwrap().clone()
    }

    /// The raw byte stream, across all connections.
    pub fn wire(&self) -> Vec<u8> {
        self.shared.wire.lock().unwrap().clone()
    }

    /// When each connect attempt (successful or not) was made.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.shared.attempts.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self) -> Result<FakeConnection, TransportError> {
        self.shared.attempts.lock().unwrap().push(Instant::now());

        let refuse = self.shared.refuse_all.load(Ordering::SeqCst)
            || self
                .shared
                .refuse_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if refuse {
            return Err(TransportError::ConnectFailed {
                addr: self.endpoint(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            });
        }

        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FakeConnection {
            id: ConnectionId::new(id),
            shared: Arc::clone(&self.shared),
            open: true,
        })
    }

    fn endpoint(&self) -> String {
        "fake:0".to_string()
    }
}

pub struct FakeConnection {
    id: ConnectionId,
    shared: Arc<Shared>,
    open: bool,
}

impl Connection for FakeConnection {
    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        if self.shared.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(TransportError::WriteFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected",
            )));
        }

        for chunk in frame.chunks(5) {
            self.shared.wire.lock().unwrap().extend_from_slice(chunk);
            tokio::task::yield_now().await;
        }
        self.shared.frames.lock().unwrap().push((self.id, frame.to_vec()));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.open {
            self.open = false;
            self.shared.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

// =========================================================================
// Fixtures
// =========================================================================

pub fn record(device_id: &str) -> Record {
    Record::new(device_id, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .with_position(10.123456, -67.654321)
        .with_speed(42.0)
}

/// No jitter, 1s base, 8s cap, 3 attempts, 30s idle threshold.
pub fn config() -> SessionConfig {
    SessionConfig {
        idle_threshold: Duration::from_secs(30),
        heartbeat_period: Duration::from_secs(1),
        connect_attempts: 3,
        backoff: BackoffConfig {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(8),
            jitter: 0.0,
        },
    }
}

/// GT06 protocol number of a standard `78 78` frame.
pub fn gt06_kind(frame: &[u8]) -> u8 {
    assert_eq!(&frame[..2], &[0x78, 0x78], "not a short GT06 frame");
    frame[3]
}

/// GT06 serial number (the two bytes before the CRC).
pub fn gt06_serial(frame: &[u8]) -> u16 {
    let n = frame.len();
    u16::from_be_bytes([frame[n - 6], frame[n - 5]])
}

pub const GT06_LOGIN: u8 = 0x01;
pub const GT06_HEARTBEAT: u8 = 0x13;
pub const GT06_LOCATION_A0: u8 = 0xA0;
