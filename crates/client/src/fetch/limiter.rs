//! Token-bucket rate limiting for outbound requests.

use std::time::Duration;
use titlescout_core::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Token bucket bounding the outbound request rate of one client.
///
/// Burst capacity is 1: the first caller proceeds immediately, every later
/// caller is scheduled one interval after the previously granted slot. The
/// mutex only guards the slot assignment; waiters sleep outside it, so many
/// tasks can wait concurrently. Fairness across waiters is not guaranteed,
/// only the aggregate rate bound.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    /// Create a limiter admitting `requests_per_second` requests on average.
    pub fn new(requests_per_second: f64) -> Self {
        let interval = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self { interval, next_slot: Mutex::new(Instant::now()) }
    }

    /// Suspend until a token is available or `cancel` fires.
    ///
    /// On cancellation returns [`Error::Cancelled`] immediately; the fetch
    /// loop propagates it without consuming retry budget.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = (*next).max(now);
            *next = slot + self.interval;
            slot
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep_until(slot) => Ok(()),
        }
    }
}
