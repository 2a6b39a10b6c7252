//! Bounded retry with exponential backoff.
//!
//! Retrying is modelled as a small state machine:
//!
//! ```text
//! Attempting(n) ──ok──► Succeeded
//!      │
//!      ├─ fatal error or n == max_retries ──► Exhausted
//!      │
//!      └─ retryable error ──► Backoff(n, delay) ──sleep──► Attempting(n + 1)
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{EmbeddingError, Result};

/// Retry configuration for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,

    /// Delay before the first retry; doubles on every further retry.
    pub base_delay: Duration,

    /// Upper bound of the random jitter added to rate-limited backoffs.
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given retry budget and base delay.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_jitter: Duration::from_secs(1),
        }
    }

    /// Set the maximum jitter for rate-limited backoffs.
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Deterministic part of the backoff before retry number `attempt + 1`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Backoff before the next attempt, jittered when rate limited.
    pub fn backoff(&self, attempt: u32, rate_limited: bool) -> Duration {
        let base = self.base_backoff(attempt);
        if !rate_limited || self.max_jitter.is_zero() {
            return base;
        }
        let jitter_ms = rand::rng().random_range(0..=self.max_jitter.as_millis() as u64);
        base + Duration::from_millis(jitter_ms)
    }

    /// Run `operation` until it succeeds, fails fatally, or the budget is spent.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = RetryState::Attempting(0);
        loop {
            state = match state {
                RetryState::Attempting(attempt) => match operation(attempt).await {
                    Ok(value) => RetryState::Succeeded(value),
                    Err(err) if !err.is_retryable() => RetryState::Exhausted(err),
                    Err(err) if attempt >= self.max_retries => {
                        RetryState::Exhausted(EmbeddingError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: Box::new(err),
                        })
                    }
                    Err(err) => {
                        let delay = self.backoff(attempt, err.is_rate_limited());
                        warn!(
                            "Embedding attempt {}/{} failed ({err}), retrying in {}ms",
                            attempt + 1,
                            self.max_retries + 1,
                            delay.as_millis()
                        );
                        RetryState::Backoff { attempt, delay }
                    }
                },
                RetryState::Backoff { attempt, delay } => {
                    tokio::time::sleep(delay).await;
                    RetryState::Attempting(attempt + 1)
                }
                RetryState::Succeeded(value) => return Ok(value),
                RetryState::Exhausted(err) => return Err(err),
            };
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

enum RetryState<T> {
    Attempting(u32),
    Backoff { attempt: u32, delay: Duration },
    Succeeded(T),
    Exhausted(EmbeddingError),
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0, false), Duration::from_secs(1));
        assert_eq!(policy.backoff(1, false), Duration::from_secs(2));
        assert_eq!(policy.backoff(2, false), Duration::from_secs(4));
    }

    #[test]
    fn test_rate_limited_backoff_is_jittered_within_bound() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.backoff(1, true);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_secs(3));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = RetryPolicy::default()
            .run(|_| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(EmbeddingError::RateLimited)
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exhausts_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let start = tokio::time::Instant::now();

        let err = RetryPolicy::default()
            .with_max_jitter(Duration::ZERO)
            .run(|_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(EmbeddingError::ApiRequest {
                        status: 500,
                        body: "boom".to_string(),
                    })
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EmbeddingError::RetriesExhausted { attempts: 4, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1s + 2s + 4s of backoff
        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_run_stops_on_fatal_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let err = RetryPolicy::default()
            .run(|_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(EmbeddingError::ProviderNotConfigured)
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EmbeddingError::ProviderNotConfigured));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
