//! Shared "seconds until next attempt" signal.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::MAX_SERVER_WAIT;

/// Last-wins rate-limit countdown shared by every clone of a client.
///
/// Holds the instant of the next scheduled attempt after a server-requested
/// wait, or nothing when no wait is pending.
#[derive(Debug, Clone)]
pub struct RateLimitCountdown {
    tx: Arc<watch::Sender<Option<Instant>>>,
}

impl Default for RateLimitCountdown {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitCountdown {
    /// Creates an idle countdown.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Publishes a wait of `wait` starting now.
    ///
    /// A wait past the clock's range is cut to [`MAX_SERVER_WAIT`].
    pub fn start(&self, wait: Duration) {
        let now = Instant::now();
        let deadline = now
            .checked_add(wait)
            .or_else(|| now.checked_add(MAX_SERVER_WAIT))
            .unwrap_or(now);
        self.tx.send_replace(Some(deadline));
    }

    /// Clears any pending wait.
    pub fn clear(&self) {
        self.tx.send_if_modified(|deadline| deadline.take().is_some());
    }

    /// Whole seconds until the next attempt, rounded up; 0 when idle.
    #[must_use]
    pub fn seconds_remaining(&self) -> u64 {
        self.tx.borrow().map_or(0, |deadline| {
            let left = deadline.saturating_duration_since(Instant::now());
            left.as_secs() + u64::from(left.subsec_nanos() > 0)
        })
    }

    /// Subscribes to deadline changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Instant>> {
        self.tx.subscribe()
    }
}
