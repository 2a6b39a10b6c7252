//! Rate limiting for bulk embedding jobs.
//!
//! Two throttles are layered:
//!
//! - a rolling 60 second window of call timestamps that admits at most
//!   `max_calls_per_minute` calls, and
//! - a fixed pause between sub-batches of `batch_size` items, which absorbs
//!   provider-side burst penalties the window cannot see.
//!
//! The window sits behind a mutex, so one limiter may be shared by several
//! tasks. Bulk jobs still process their items strictly one at a time.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Length of the rolling window.
const WINDOW: Duration = Duration::from_secs(60);

/// Extra wait after the oldest call leaves the window.
const SAFETY_BUFFER: Duration = Duration::from_secs(1);

/// Throttle settings, fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum calls admitted in any rolling minute.
    pub max_calls_per_minute: usize,

    /// Items per sub-batch.
    pub batch_size: usize,

    /// Pause between sub-batches (in seconds).
    pub batch_delay_secs: u64,
}

impl RateLimitConfig {
    /// Pause between sub-batches.
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // Conservative free-tier quota: 3 calls every 13s stays under 5/min.
        Self {
            max_calls_per_minute: 5,
            batch_size: 3,
            batch_delay_secs: 13,
        }
    }
}

/// Rolling-window rate limiter and sequential batch runner.
///
/// Create one per process and share it; the window is never reset.
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter. Zero limits are raised to one.
    pub fn new(config: RateLimitConfig) -> Self {
        let config = RateLimitConfig {
            max_calls_per_minute: config.max_calls_per_minute.max(1),
            batch_size: config.batch_size.max(1),
            ..config
        };
        Self {
            config,
            window: Mutex::new(VecDeque::with_capacity(config.max_calls_per_minute)),
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of calls admitted in the last 60 seconds.
    pub async fn recent_calls(&self) -> usize {
        let mut window = self.window.lock().await;
        prune(&mut window, Instant::now());
        window.len()
    }

    /// Wait until the window has room, then record a call.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                prune(&mut window, now);

                if window.len() < self.config.max_calls_per_minute {
                    window.push_back(now);
                    return;
                }

                window
                    .front()
                    .map(|oldest| (*oldest + WINDOW + SAFETY_BUFFER).saturating_duration_since(now))
                    .unwrap_or_default()
            };

            info!(
                "Rate limit of {} calls/min reached, waiting {}s",
                self.config.max_calls_per_minute,
                wait.as_secs()
            );
            // Re-check afterwards: another task may have filled the slot.
            tokio::time::sleep(wait).await;
        }
    }

    /// Run `processor` over `items` in order, one at a time, under the limit.
    ///
    /// Returns how many items the processor reported success for. A failed
    /// item never stops the batch. `on_progress` is called after every item
    /// with `(processed, total)`.
    pub async fn process_batch<T, F, Fut, P>(
        &self,
        items: Vec<T>,
        mut processor: F,
        mut on_progress: P,
    ) -> usize
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = bool>,
        P: FnMut(usize, usize),
    {
        let total = items.len();
        let batch_size = self.config.batch_size;
        let batch_count = total.div_ceil(batch_size);
        let mut succeeded = 0;

        for (index, item) in items.into_iter().enumerate() {
            if index > 0 && index % batch_size == 0 {
                debug!(
                    "Finished batch {}/{batch_count}, pausing {}s",
                    index / batch_size,
                    self.config.batch_delay_secs
                );
                tokio::time::sleep(self.config.batch_delay()).await;
            }

            self.acquire().await;
            if processor(item).await {
                succeeded += 1;
            }
            on_progress(index + 1, total);
        }

        succeeded
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant) {
    while window
        .front()
        .is_some_and(|oldest| now.duration_since(*oldest) >= WINDOW)
    {
        window.pop_front();
    }
}
