//! Retry classification and fixed-interval retry policy for search calls.
//!
//! # Overview
//!
//! Every failed call is passed through [`classify`], a pure function of the
//! error kind and status code:
//! - [`RetryClass::Retryable`] - rate limiting (429), server errors (5xx),
//!   timeouts, network and decode failures
//! - [`RetryClass::NonRetryable`] - every other API status and malformed requests
//!
//! The [`RetryPolicy`] then decides whether another attempt is allowed and how
//! long to wait. Unlike download backoff, the wait is a fixed interval: the
//! search API publishes its quota per second, so doubling delays only slow
//! the run without reducing 429s.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use brave_search_core::search::{classify, RetryClass, RetryDecision, RetryPolicy, SearchError};
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(3));
//! let error = SearchError::api(503, "503 Service Unavailable", "");
//!
//! assert_eq!(classify(&error), RetryClass::Retryable);
//! assert_eq!(
//!     policy.should_retry(classify(&error), 1),
//!     RetryDecision::Retry { delay: Duration::from_secs(3), attempt: 2 }
//! );
//! ```

use std::time::Duration;

use tracing::debug;

use super::SearchError;

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Default wait between attempts.
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(3);

/// Whether a failed call may succeed if repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Temporary failure; another attempt may succeed.
    Retryable,
    /// Terminal failure; repeating the same request would not help.
    NonRetryable,
}

/// Decision on whether to attempt a failed request again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make attempt number `attempt` (1-indexed).
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// The attempt about to be made.
        attempt: u32,
    },

    /// Stop retrying.
    DoNotRetry {
        /// Why no further attempt is made.
        reason: String,
    },
}

/// Retry budget for one page fetch.
///
/// `max_attempts` is always `1 + retry_count`; a retry count of zero means a
/// single attempt with no waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retry_count: u32,
    wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            wait: DEFAULT_RETRY_WAIT,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `retry_count` retries spaced `wait` apart.
    #[must_use]
    pub fn new(retry_count: u32, wait: Duration) -> Self {
        Self { retry_count, wait }
    }

    /// Returns the configured number of retries.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the total number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Returns the wait between attempts.
    #[must_use]
    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Decides whether to retry after `attempt` (1-indexed) failed with `class`.
    #[must_use]
    pub fn should_retry(&self, class: RetryClass, attempt: u32) -> RetryDecision {
        if class == RetryClass::NonRetryable {
            return RetryDecision::DoNotRetry {
                reason: "non-retryable error".to_string(),
            };
        }

        if attempt >= self.max_attempts() {
            debug!(attempt, max_attempts = self.max_attempts(), "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts()),
            };
        }

        RetryDecision::Retry {
            delay: self.wait,
            attempt: attempt + 1,
        }
    }
}

/// Classifies a search error for retry decisions.
///
/// | Error | Class |
/// |-------|-------|
/// | API 429 | Retryable |
/// | API 5xx | Retryable |
/// | API, any other status | NonRetryable |
/// | Timeout | Retryable |
/// | Network | Retryable |
/// | Decode | Retryable |
/// | InvalidRequest | NonRetryable |
#[must_use]
pub fn classify(error: &SearchError) -> RetryClass {
    match error {
        SearchError::Api { status, .. } => classify_status(*status),
        SearchError::Timeout | SearchError::Network { .. } | SearchError::Decode { .. } => {
            RetryClass::Retryable
        }
        SearchError::InvalidRequest { .. } => RetryClass::NonRetryable,
    }
}

#[allow(clippy::match_same_arms)]
fn classify_status(status: u16) -> RetryClass {
    match status {
        429 => RetryClass::Retryable, // Too Many Requests
        500..=599 => RetryClass::Retryable,

        // 401/403 mean a bad or exhausted key; 422 a rejected parameter
        _ => RetryClass::NonRetryable,
    }
}
