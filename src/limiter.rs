use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Token-bucket limiter for outbound API calls. The Notion API allows an
/// average of 3 requests per second; with a burst of 1 that degenerates to
/// a minimum spacing of 1/3 s between permits.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(per_second: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / f64::from(per_second)),
            next_slot: Mutex::new(None),
        }
    }

    /// Block until a permit is available or `cancel` fires. Permits are
    /// handed out in call order; the wait is a cooperative sleep, never a
    /// busy poll.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        let wake = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep_until(wake) => Ok(()),
        }
    }
}
