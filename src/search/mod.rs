//! Search pipeline: API client, retry, rate limiting and query execution.
//!
//! # Features
//!
//! - One `reqwest` client per run, shared by every worker
//! - Pure retry classification (429 / 5xx / transport errors retry)
//! - Global token-bucket rate limiting with cancellable waits
//! - Automatic pagination up to the API's page cap
//! - Fixed-size worker pool with run-wide fail-fast cancellation
//!
//! # Example
//!
//! ```no_run
//! use brave_search_core::search::{BraveClient, PageRequest, SearchClient, TransportOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BraveClient::new(&TransportOptions::default())?;
//! let (page, _meta) = client.search("my-api-key", &PageRequest::new("rust tokio")).await?;
//! for url in page.urls {
//!     println!("{url}");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod pool;
pub mod rate_limiter;
mod request;
mod response;
mod retry;
mod runner;

pub use client::{
    BraveClient, DEFAULT_ENDPOINT, SearchClient, TransportOptions, default_user_agent,
    parse_proxy_url,
};
pub use error::{MAX_ERROR_BODY_BYTES, SearchError};
pub use pool::{DEFAULT_THREADS, WorkerPool};
pub use rate_limiter::{Cancelled, DEFAULT_RATE_LIMIT, RateLimiter};
pub use request::{MAX_COUNT, MAX_PAGE, MIN_COUNT, PageRequest, SafeSearch};
pub use response::{PageResult, ResponseMeta, SearchResponse};
pub use retry::{
    DEFAULT_RETRY_COUNT, DEFAULT_RETRY_WAIT, RetryClass, RetryDecision, RetryPolicy, classify,
};
pub use runner::{QueryError, QueryRunner, SearchSettings, SearchStats};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, SearchError>` explicitly in function signatures.
