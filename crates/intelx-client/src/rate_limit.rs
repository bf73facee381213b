//! Process-wide call spacing.
//!
//! One [`RateLimiter`] is shared (behind an `Arc`) by every transport and
//! search in the process. Callers queue on a fair tokio mutex, so waiters are
//! served in arrival order, and the permit they receive keeps the limiter
//! locked until the call it guards has finished.

use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive outbound calls.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter with the given minimum spacing.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Create a limiter that never delays. Useful for tests.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Configured minimum spacing.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call is allowed.
    ///
    /// The returned permit must be held for the duration of the call; the
    /// "last call" timestamp is stamped when it is dropped.
    pub async fn acquire(&self) -> RatePermit<'_> {
        let guard = self.last_call.lock().await;

        if let Some(last) = *guard {
            let ready_at = last + self.min_interval;
            if ready_at > Instant::now() {
                tracing::trace!(wait = ?(ready_at - Instant::now()), "Rate limiter delaying call");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        RatePermit { guard }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(intelx_core::DEFAULT_RATE_LIMIT_MS))
    }
}

/// Exclusive right to issue one call. Releases the limiter on drop.
#[derive(Debug)]
pub struct RatePermit<'a> {
    guard: MutexGuard<'a, Option<Instant>>,
}

impl Drop for RatePermit<'_> {
    fn drop(&mut self) {
        *self.guard = Some(Instant::now());
    }
}
