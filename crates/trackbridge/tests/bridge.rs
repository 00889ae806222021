//! End-to-end tests: records forwarded through a [`Bridge`] arrive at real
//! loopback listeners standing in for the destination platforms.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use trackbridge::prelude::*;
use trackbridge::protocol::BuilderOptions;
use trackbridge::{AssignmentError, DestinationConfig};

// =========================================================================
// Helpers
// =========================================================================

/// A fake destination platform: accepts any number of connections and
/// records every byte it receives.
struct Platform {
    port: u16,
    received: Arc<Mutex<Vec<u8>>>,
    disconnects: Arc<AtomicUsize>,
}

impl Platform {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        let port = listener.local_addr().expect("local addr").port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let disconnects = Arc::new(AtomicUsize::new(0));

        let (rx, dc) = (Arc::clone(&received), Arc::clone(&disconnects));
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let (rx, dc) = (Arc::clone(&rx), Arc::clone(&dc));
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => {
                                dc.fetch_add(1, Ordering::SeqCst);
                                break;
                            }
                            Ok(n) => rx.lock().unwrap().extend_from_slice(&buf[..n]),
                        }
                    }
                });
            }
        });

        Self {
            port,
            received,
            disconnects,
        }
    }

    fn bytes(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }

    /// Waits until at least `n` bytes have arrived.
    async fn wait_for_bytes(&self, n: usize) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let bytes = self.bytes();
                if bytes.len() >= n {
                    return bytes;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("platform should receive bytes")
    }

    async fn wait_for_disconnect(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.disconnects.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("platform should see the connection close");
    }
}

fn config(gt06: u16, suntech: u16, default: Option<ProtocolName>) -> BridgeConfig {
    let mut config = BridgeConfig::single(ProtocolName::Gt06, "127.0.0.1", gt06);
    config.destinations.insert(
        ProtocolName::Suntech4g,
        DestinationConfig {
            host: "127.0.0.1".into(),
            port: suntech,
            account: None,
            builder: BuilderOptions::default(),
        },
    );
    config.default_protocol = default;
    config.validate().expect("test config should be valid");
    config
}

fn record(device_id: &str) -> Record {
    Record::new(device_id, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .with_position(10.123456, -67.654321)
        .with_speed(42.0)
}

/// GT06 login (18 bytes) followed by one 0xA0 location frame (53 bytes).
const GT06_LOGIN_AND_LOCATION: usize = 18 + 53;

struct FailingStore;

impl AssignmentStore for FailingStore {
    async fn assigned_protocol(
        &self,
        _device_id: &str,
    ) -> Result<Option<ProtocolName>, AssignmentError> {
        Err(AssignmentError("connection refused".into()))
    }
}

// =========================================================================
// Routing
// =========================================================================

#[tokio::test]
async fn test_forward_unassigned_device_uses_default_protocol() {
    let (gt06, suntech) = (Platform::start().await, Platform::start().await);
    let bridge = Bridge::from_config(
        &config(gt06.port, suntech.port, Some(ProtocolName::Gt06)),
        InMemoryAssignments::new(),
    );

    let ack = bridge
        .router()
        .forward("123456789012345", &record("123456789012345"))
        .await
        .unwrap();

    assert_eq!(ack.protocol, ProtocolName::Gt06);
    assert_eq!(ack.frames, 1);
    assert_eq!(ack.bytes, GT06_LOGIN_AND_LOCATION - 18, "location frame only");
    let bytes = gt06.wait_for_bytes(GT06_LOGIN_AND_LOCATION).await;
    assert_eq!(&bytes[..4], &[0x78, 0x78, 0x0D, 0x01], "login first");
    assert_eq!(bytes[18 + 3], 0xA0, "then the location frame");
    assert!(suntech.bytes().is_empty());

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_forward_assigned_device_routes_to_its_protocol() {
    let (gt06, suntech) = (Platform::start().await, Platform::start().await);
    let store = InMemoryAssignments::new();
    store.assign("0907126119", ProtocolName::Suntech4g);
    let bridge = Bridge::from_config(
        &config(gt06.port, suntech.port, Some(ProtocolName::Gt06)),
        store,
    );

    let ack = bridge
        .router()
        .forward("0907126119", &record("0907126119"))
        .await
        .unwrap();

    assert_eq!(ack.protocol, ProtocolName::Suntech4g);
    let bytes = suntech.wait_for_bytes(ack.bytes).await;
    assert!(bytes.starts_with(b"STT;0907126119;"));
    assert_eq!(bytes.last(), Some(&b'\r'));
    assert!(gt06.bytes().is_empty());

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_forward_reassignment_takes_effect_on_next_record() {
    let (gt06, suntech) = (Platform::start().await, Platform::start().await);
    let bridge = Bridge::from_config(
        &config(gt06.port, suntech.port, Some(ProtocolName::Gt06)),
        InMemoryAssignments::new(),
    );
    let router = bridge.router();

    let first = router.forward("0907126119", &record("0907126119")).await.unwrap();
    router.store().assign("0907126119", ProtocolName::Suntech4g);
    let second = router.forward("0907126119", &record("0907126119")).await.unwrap();

    assert_eq!(first.protocol, ProtocolName::Gt06);
    assert_eq!(second.protocol, ProtocolName::Suntech4g);

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_forward_without_assignment_or_default_is_no_route() {
    let (gt06, suntech) = (Platform::start().await, Platform::start().await);
    let bridge = Bridge::from_config(
        &config(gt06.port, suntech.port, None),
        InMemoryAssignments::new(),
    );

    let err = bridge
        .router()
        .forward("123456789012345", &record("123456789012345"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForwardError::NoRoute(ref id) if id == "123456789012345"));
    assert_eq!(bridge.registry().active_count(), 0);
}

#[tokio::test]
async fn test_forward_store_failure_falls_back_to_default() {
    let (gt06, suntech) = (Platform::start().await, Platform::start().await);
    let bridge = Bridge::from_config(
        &config(gt06.port, suntech.port, Some(ProtocolName::Gt06)),
        FailingStore,
    );

    let ack = bridge
        .router()
        .forward("123456789012345", &record("123456789012345"))
        .await
        .unwrap();

    assert_eq!(ack.protocol, ProtocolName::Gt06);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_forward_store_failure_without_default_surfaces() {
    let (gt06, suntech) = (Platform::start().await, Platform::start().await);
    let bridge = Bridge::from_config(&config(gt06.port, suntech.port, None), FailingStore);

    let err = bridge
        .router()
        .forward("123456789012345", &record("123456789012345"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForwardError::AssignmentLookup(_)));
}

// =========================================================================
// Failure classes
// =========================================================================

#[tokio::test]
async fn test_forward_invalid_record_is_encoding_error() {
    let (gt06, suntech) = (Platform::start().await, Platform::start().await);
    let bridge = Bridge::from_config(
        &config(gt06.port, suntech.port, Some(ProtocolName::Gt06)),
        InMemoryAssignments::new(),
    );
    let router = bridge.router();

    let err = router
        .forward("123456789012345", &Record::new("123456789012345", Utc::now()))
        .await
        .unwrap_err();
    assert!(err.is_encoding(), "got {err:?}");
    assert!(!err.is_transport());

    // The session is unaffected.
    router
        .forward("123456789012345", &record("123456789012345"))
        .await
        .unwrap();
    gt06.wait_for_bytes(GT06_LOGIN_AND_LOCATION).await;

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_forward_destination_down_is_transport_error() {
    let closed_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let suntech = Platform::start().await;
    let mut config = config(closed_port, suntech.port, Some(ProtocolName::Gt06));
    config.session.connect_attempts = 1;
    let bridge = Bridge::from_config(&config, InMemoryAssignments::new());
    let router = bridge.router();

    let err = router
        .forward("123456789012345", &record("123456789012345"))
        .await
        .unwrap_err();
    assert!(err.is_transport(), "got {err:?}");

    // A different protocol keeps working while GT06 is down.
    router.store().assign("0907126119", ProtocolName::Suntech4g);
    router
        .forward("0907126119", &record("0907126119"))
        .await
        .unwrap();

    bridge.shutdown().await;
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_closes_connections_and_rejects_forwards() {
    let (gt06, suntech) = (Platform::start().await, Platform::start().await);
    let bridge = Bridge::from_config(
        &config(gt06.port, suntech.port, Some(ProtocolName::Gt06)),
        InMemoryAssignments::new(),
    );
    let router = bridge.router();
    router
        .forward("123456789012345", &record("123456789012345"))
        .await
        .unwrap();

    bridge.shutdown().await;

    gt06.wait_for_disconnect().await;
    let err = router
        .forward("123456789012345", &record("123456789012345"))
        .await
        .unwrap_err();
    assert!(matches!(err, ForwardError::Session(SessionError::Closed)));
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_forward_concurrent_producers_share_one_connection() {
    let (gt06, suntech) = (Platform::start().await, Platform::start().await);
    let bridge = Bridge::from_config(
        &config(gt06.port, suntech.port, Some(ProtocolName::Suntech4g)),
        InMemoryAssignments::new(),
    );
    let router = bridge.router();

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                let id = format!("{i:010}");
                router.forward(&id, &record(&id)).await
            })
        })
        .collect();
    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap().unwrap().bytes;
    }

    let bytes = suntech.wait_for_bytes(total).await;
    let text = String::from_utf8(bytes).unwrap();
    let reports: Vec<&str> = text.split('\r').filter(|r| !r.is_empty()).collect();
    assert_eq!(reports.len(), 40);
    assert!(reports.iter().all(|r| r.starts_with("STT;") && r.split(';').count() == 21));
    assert_eq!(bridge.registry().active_count(), 1);

    bridge.shutdown().await;
}

// =========================================================================
// Configuration
// =========================================================================

#[test]
fn test_from_file_missing_is_io_error() {
    let err = BridgeConfig::from_file("/nonexistent/trackbridge.toml").unwrap_err();
    assert!(matches!(err, trackbridge::ConfigError::Io(_)));
}

#[tokio::test]
async fn test_with_config_assignments_seeds_store() {
    let (gt06, suntech) = (Platform::start().await, Platform::start().await);
    let mut config = config(gt06.port, suntech.port, Some(ProtocolName::Gt06));
    config
        .assignments
        .insert("0907126119".into(), ProtocolName::Suntech4g);
    let bridge = Bridge::with_config_assignments(config);

    let ack = bridge
        .router()
        .forward("0907126119", &record("0907126119"))
        .await
        .unwrap();

    assert_eq!(ack.protocol, ProtocolName::Suntech4g);
    bridge.shutdown().await;
}
