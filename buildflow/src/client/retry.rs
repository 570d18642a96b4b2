//! Backoff delay computation for the model client.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::errors::ClientError;

/// Longest server-requested wait honored; longer hints are cut to this.
pub const MAX_SERVER_WAIT: Duration = Duration::from_secs(60 * 60);

/// Jitter applied to computed backoff delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// Where a retry delay came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelaySource {
    /// Exponential backoff.
    Computed,
    /// A wait the server asked for.
    Server,
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the delay.
    Retry(Duration, DelaySource),
    /// No attempts left.
    GiveUp,
    /// The error is fatal.
    NotRetryable,
}

/// Attempt count and accumulated delay for one call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetryEnvelope {
    /// Retries taken so far.
    pub attempt: u32,
    /// Total time spent waiting between attempts.
    pub total_delay: Duration,
}

impl RetryEnvelope {
    /// Creates an empty envelope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no retries remain.
    #[must_use]
    pub const fn is_exhausted(&self, config: &ClientConfig) -> bool {
        self.attempt >= config.max_retries
    }

    /// Decides whether to retry after `error` and records the delay taken.
    pub fn decide(&mut self, error: &ClientError, config: &ClientConfig) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::NotRetryable;
        }
        if self.is_exhausted(config) {
            return RetryDecision::GiveUp;
        }

        let (delay, source) = error.retry_after().map_or_else(
            || (backoff_delay(config, self.attempt), DelaySource::Computed),
            |wait| (wait.min(MAX_SERVER_WAIT), DelaySource::Server),
        );
        self.attempt += 1;
        self.total_delay = self.total_delay.saturating_add(delay);
        RetryDecision::Retry(delay, source)
    }
}

/// Computes the delay before retry `attempt` (0-indexed).
///
/// `initial_delay * 2^attempt`, capped at `max_delay`, then jittered.
#[must_use]
pub fn backoff_delay(config: &ClientConfig, attempt: u32) -> Duration {
    let base = config.initial_delay_ms;
    let delay = base
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_delay_ms);

    let jittered = match config.jitter {
        JitterStrategy::None => delay,
        JitterStrategy::Full => {
            if delay == 0 {
                0
            } else {
                rand::thread_rng().gen_range(0..=delay)
            }
        }
        JitterStrategy::Equal => {
            let half = delay / 2;
            if half == 0 {
                delay
            } else {
                half + rand::thread_rng().gen_range(0..=half)
            }
        }
    };

    Duration::from_millis(jittered)
}
