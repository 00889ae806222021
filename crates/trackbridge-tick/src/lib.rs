//! Fixed-period tick scheduler for Trackbridge.
//!
//! Each session's heartbeat task owns one [`TickScheduler`] and checks for
//! idleness every time it fires. The scheduler only keeps time; what a tick
//! means is up to the caller.
//!
//! # Integration
//!
//! The scheduler is designed to sit inside a task's `tokio::select!` loop
//! next to a shutdown signal:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = shutdown.changed() => break,
//!         _ = scheduler.wait_for_tick() => session.heartbeat_if_due().await,
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. `Duration::ZERO` = never tick.
    pub period: Duration,
    /// Random jitter (0–max) added to the *first* tick, so sessions
    /// created at the same instant do not all check at once.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Duration::ZERO,
            initial_jitter: Duration::from_millis(250),
        }
    }
}

impl TickConfig {
    /// A config that ticks every `period`, with default jitter.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Tick period, or `None` when the scheduler never fires.
    pub fn tick_duration(&self) -> Option<Duration> {
        if self.period.is_zero() {
            None
        } else {
            Some(self.period)
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired more than 10% of a period late.
    pub overrun: bool,
    /// How many whole periods were skipped because of the overrun.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-period tick scheduler.
///
/// A late tick never causes a burst of catch-up ticks: the next deadline
/// is always computed from the moment the late tick actually fired.
pub struct TickScheduler {
    tick_duration: Option<Duration>,
    tick_count: u64,
    /// When the next tick should fire.
    next_tick: Option<Instant>,
}

impl TickScheduler {
    /// Create a new scheduler from config.
    pub fn new(config: TickConfig) -> Self {
        let tick_duration = config.tick_duration();

        let next_tick = tick_duration.map(|d| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max))
            };
            Instant::now() + d + jitter
        });

        match tick_duration {
            Some(period) => debug!(period_ms = period.as_millis() as u64, "tick scheduler created"),
            None => debug!("tick scheduler created with no period (never fires)"),
        }

        Self {
            tick_duration,
            tick_count: 0,
            next_tick,
        }
    }

    /// Create a scheduler for `period` with default jitter.
    pub fn every(period: Duration) -> Self {
        Self::new(TickConfig::every(period))
    }

    /// Wait until the next tick is due.
    ///
    /// With no period this future pends forever. It never resolves
    /// on its own, but `tokio::select!` will still process other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, tick_dur) = match (self.next_tick, self.tick_duration) {
            (Some(next), Some(dur)) => (next, dur),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > tick_dur / 10;
        let mut ticks_skipped = 0u64;

        if overrun {
            ticks_skipped = (late_by.as_nanos() / tick_dur.as_nanos()) as u64;
            if ticks_skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "tick overrun, skipping ahead"
                );
            }
        }

        // Always schedule from now, not from the missed deadline.
        self.next_tick = Some(now + tick_dur);

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Number of ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The tick period, or `None` if the scheduler never fires.
    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }
}
