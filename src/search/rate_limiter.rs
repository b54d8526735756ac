//! Process-wide rate limiting for search API calls.
//!
//! This module provides the [`RateLimiter`] struct, a token bucket shared by
//! every worker so that the aggregate request rate never exceeds the
//! configured requests per second.
//!
//! # Overview
//!
//! The bucket holds at most `rate` tokens and refills continuously at `rate`
//! tokens per second, so a burst of one second's worth of calls is allowed
//! and the long-run rate is capped at `rate`. A caller that finds the bucket
//! empty sleeps until the next token is due, or until the run is cancelled.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use brave_search_core::search::RateLimiter;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let limiter = Arc::new(RateLimiter::new(5));
//! let cancel = CancellationToken::new();
//!
//! // The first five calls proceed immediately, the sixth waits ~200ms.
//! for _ in 0..6 {
//!     limiter.acquire(&cancel).await.unwrap();
//! }
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Default requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 5;

/// Returned when cancellation fires while waiting for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limiter wait cancelled")]
pub struct Cancelled;

/// Global token-bucket rate limiter.
///
/// Wrap in `Arc` and share across tasks. Token accounting happens under a
/// single `tokio::sync::Mutex`; the lock is never held across a sleep.
#[derive(Debug)]
pub struct RateLimiter {
    /// Requests per second; also the bucket capacity.
    rate: u32,

    bucket: Mutex<Bucket>,

    /// Total time callers spent waiting for tokens (milliseconds).
    waited_ms: AtomicU64,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(rate);
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// Creates a limiter allowing `requests_per_second` calls per second.
    ///
    /// A rate of zero is raised to one; the bucket starts full.
    #[must_use]
    #[instrument(skip_all, fields(rate = requests_per_second))]
    pub fn new(requests_per_second: u32) -> Self {
        let rate = requests_per_second.max(1);
        debug!("creating rate limiter");
        Self {
            rate,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(rate),
                last_refill: Instant::now(),
            }),
            waited_ms: AtomicU64::new(0),
        }
    }

    /// Returns the configured requests per second.
    #[must_use]
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Returns the cumulative time callers have spent waiting for tokens.
    #[must_use]
    pub fn total_wait(&self) -> Duration {
        Duration::from_millis(self.waited_ms.load(Ordering::Relaxed))
    }

    /// Takes one token, waiting for the bucket to refill if it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` fires before a token is obtained. No
    /// token is consumed in that case.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        let rate = f64::from(self.rate);

        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }

            let wait = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(Instant::now(), rate);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / rate)
            };

            debug!(wait_ms = wait.as_millis(), "rate limit reached, waiting for token");

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Cancelled),
                () = tokio::time::sleep(wait) => {
                    self.record_wait(wait);
                }
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn record_wait(&self, wait: Duration) {
        self.waited_ms
            .fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
    }
}
