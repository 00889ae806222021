//! Reads newline-delimited JSON records from stdin and forwards each one.
//!
//! ```text
//! echo '{"device_id":"123456789012345","timestamp":"2024-01-01T00:00:00Z",
//!        "latitude":10.12,"longitude":-67.65,"speed_kmh":42}' \
//!   | stdin-bridge --config bridge.toml
//! ```
//!
//! Exits on EOF or Ctrl-C, closing every destination connection first.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use trackbridge::prelude::*;

/// Forward JSON-lines telemetry records to tracking platforms.
#[derive(Parser, Debug)]
#[command(name = "stdin-bridge", version, about)]
struct Args {
    /// Path to the bridge configuration (TOML).
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (overrides the config file; RUST_LOG overrides both).
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Debug, Default)]
struct Tally {
    sent: u64,
    dropped: u64,
    failed: u64,
    malformed: u64,
}

#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    let args = Args::parse();

    let config = BridgeConfig::from_file(&args.config)?;
    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    trackbridge::init_logging(level);

    info!(
        config = %args.config.display(),
        destinations = config.destinations.len(),
        "starting stdin bridge"
    );

    let bridge = Bridge::with_config_assignments(config);
    let router = bridge.router();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tally = Tally::default();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let record: Record = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed line");
                tally.malformed += 1;
                continue;
            }
        };

        match router.forward(&record.device_id, &record).await {
            Ok(ack) => {
                tally.sent += 1;
                info!(
                    device_id = %record.device_id,
                    protocol = %ack.protocol,
                    bytes = ack.bytes,
                    "forwarded"
                );
            }
            Err(e) if e.is_encoding() => {
                tally.dropped += 1;
                warn!(device_id = %record.device_id, error = %e, "record dropped");
            }
            Err(e) => {
                tally.failed += 1;
                warn!(device_id = %record.device_id, error = %e, "forward failed");
            }
        }
    }

    bridge.shutdown().await;
    info!(
        sent = tally.sent,
        dropped = tally.dropped,
        failed = tally.failed,
        malformed = tally.malformed,
        "stdin bridge stopped"
    );
    Ok(())
}
