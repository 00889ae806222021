//! Exponential reconnect backoff with subtractive jitter.

use std::time::Duration;

use rand::Rng;

/// Backoff tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failure, and the floor for every delay.
    pub base: Duration,
    /// Upper bound for every delay.
    pub cap: Duration,
    /// Fraction (0.0–1.0) of each delay that may be randomly shaved off,
    /// so sessions that failed together do not retry in lockstep.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

/// Tracks consecutive connect failures and hands out the next delay.
///
/// Every delay lies in `base..=cap`, whatever the jitter draws.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    failures: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Records a failure and returns how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.failures);
        self.failures = self.failures.saturating_add(1);

        let exp = self.config.base.saturating_mul(factor).min(self.config.cap);

        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let delay = if jitter > 0.0 {
            let cut = exp.mul_f64(rand::rng().random_range(0.0..=jitter));
            exp.saturating_sub(cut)
        } else {
            exp
        };

        delay.max(self.config.base).min(self.config.cap)
    }

    /// Forgets past failures after a successful connect.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
