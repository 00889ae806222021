//! Background heartbeat task, one per session.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use trackbridge_tick::TickScheduler;
use trackbridge_transport::Connector;

use crate::{Heartbeat, Session};

/// Spawns the idle check loop for `session`.
///
/// Every `heartbeat_period` the task asks the session whether it has been
/// idle past its threshold; the session itself decides and sends. The task
/// exits when `shutdown` changes or its sender is dropped.
pub(crate) fn spawn<K: Connector>(
    session: Arc<Session<K>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut ticker = TickScheduler::every(session.config().heartbeat_period);

    tokio::spawn(async move {
        let protocol = session.protocol();
        if *shutdown.borrow() {
            return;
        }
        debug!(%protocol, "heartbeat task started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                tick = ticker.wait_for_tick() => {
                    if tick.overrun {
                        debug!(%protocol, skipped = tick.ticks_skipped, "heartbeat check ran late");
                    }
                    trace!(%protocol, tick = tick.tick, "heartbeat check");

                    // A due heartbeat may be reconnecting with backoff; shutdown wins.
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        result = session.heartbeat_if_due() => match result {
                            Ok(Heartbeat::Sent) | Ok(Heartbeat::NotDue) => {}
                            Err(e) => warn!(%protocol, error = %e, "heartbeat failed"),
                        },
                    }
                }
            }
        }

        debug!(%protocol, "heartbeat task stopped");
    })
}
