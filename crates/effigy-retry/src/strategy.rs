//! Per-ask retry state
//!
//! A [`RetryAttempt`] is created when an ask starts and destroyed when it
//! resolves or exhausts its attempts. It owns the attempt counter and the
//! backoff arithmetic; the driving loop in [`crate::ask`] owns the sleeping.

use effigy_core::config::RetryStrategy;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Ephemeral state for one retried ask
#[derive(Debug)]
pub struct RetryAttempt {
    strategy: RetryStrategy,
    /// Attempts performed so far
    attempt: u32,
    started_at: Instant,
}

impl RetryAttempt {
    /// Fresh state; no attempt has been made yet
    pub fn new(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            attempt: 0,
            started_at: Instant::now(),
        }
    }

    /// 1-based number of the attempt about to run (or just run)
    pub fn attempt_number(&self) -> u32 {
        self.attempt
    }

    /// Time since the ask started
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Record the start of the next attempt
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Delay before the next attempt, or `None` when attempts are exhausted.
    ///
    /// For exponential backoff the delay grows as `min * 2^(n-1)`, capped at
    /// the configured maximum, then jittered multiplicatively by the random
    /// factor; the jittered value is capped at the maximum as well.
    pub fn next_delay<R: Rng>(&self, rng: &mut R) -> Option<Duration> {
        if self.attempt >= self.strategy.max_attempts() {
            return None;
        }
        match &self.strategy {
            RetryStrategy::NoRetry => None,
            RetryStrategy::FixedDelay { delay_ms, .. } => Some(Duration::from_millis(*delay_ms)),
            RetryStrategy::ExponentialBackoff {
                min_delay_ms,
                max_delay_ms,
                random_factor,
                ..
            } => {
                let exponent = self.attempt.saturating_sub(1).min(32);
                let base = min_delay_ms.saturating_mul(1u64 << exponent).min(*max_delay_ms);
                let factor = random_factor.clamp(0.0, 1.0);
                let jitter = 1.0 + factor * (rng.gen::<f64>() * 2.0 - 1.0);
                let delayed = ((base as f64) * jitter).max(0.0) as u64;
                Some(Duration::from_millis(delayed.min(*max_delay_ms)))
            }
        }
    }
}
