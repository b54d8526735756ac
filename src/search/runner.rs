//! Per-query execution: retry around each page fetch, then pagination.
//!
//! # Overview
//!
//! [`QueryRunner::run`] drives one query through its state machine:
//!
//! ```text
//! Attempting ──ok──▶ Success ──more & --all──▶ (next page) Attempting
//!     │                 └──────otherwise─────▶ Done
//!     ├─retryable & budget left─▶ Retrying ─wait─▶ Attempting
//!     └─terminal──────────────────▶ Failed
//! ```
//!
//! Every attempt checks cancellation, takes a rate-limiter token and the next
//! API key before calling the [`SearchClient`]. Each page starts with a fresh
//! attempt budget. New URLs are deduplicated through the shared
//! [`ResultStore`] and emitted immediately via the [`LineWriter`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::rate_limiter::RateLimiter;
use super::request::{MAX_PAGE, PageRequest, SafeSearch};
use super::response::{PageResult, ResponseMeta};
use super::retry::{RetryClass, RetryDecision, RetryPolicy, classify};
use super::{SearchClient, SearchError};
use crate::keys::KeyProvider;
use crate::output::LineWriter;
use crate::store::ResultStore;

/// Terminal outcome of a query that did not complete.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Run-wide cancellation was observed.
    #[error("query cancelled")]
    Cancelled,

    /// Rate limiting or server errors persisted through every attempt.
    #[error("query {query:?} failed after {attempts} attempts: {last}")]
    RetryableExhausted {
        /// The failing query.
        query: String,
        /// Attempts made on the failing page.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: SearchError,
    },

    /// The API rejected the request outright (e.g. 401, 422).
    #[error("query {query:?} failed: {source}")]
    NonRetryable {
        /// The failing query.
        query: String,
        /// The API error.
        #[source]
        source: SearchError,
    },

    /// Network, timeout or decode failures persisted through every attempt.
    #[error("query {query:?} failed after {attempts} attempts: {source}")]
    TransportFailure {
        /// The failing query.
        query: String,
        /// Attempts made on the failing page.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: SearchError,
    },

    /// A worker task panicked while running a query.
    #[error("worker task panicked: {message}")]
    WorkerPanicked {
        /// The join error text.
        message: String,
    },
}

impl QueryError {
    fn terminal(query: &str, attempts: u32, class: RetryClass, error: SearchError) -> Self {
        let query = query.to_string();
        match (class, &error) {
            (RetryClass::NonRetryable, _) => Self::NonRetryable {
                query,
                source: error,
            },
            (RetryClass::Retryable, SearchError::Api { .. }) => Self::RetryableExhausted {
                query,
                attempts,
                last: error,
            },
            (RetryClass::Retryable, _) => Self::TransportFailure {
                query,
                attempts,
                source: error,
            },
        }
    }

    /// Returns true for [`QueryError::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Attempts made on the failing page (1 for non-retryable errors).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Cancelled | Self::WorkerPanicked { .. } => 0,
            Self::NonRetryable { .. } => 1,
            Self::RetryableExhausted { attempts, .. } | Self::TransportFailure { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Per-run search parameters shared by every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Results per page.
    pub count: u8,
    /// First page to fetch.
    pub page: u8,
    /// SafeSearch mode.
    pub safe_search: SafeSearch,
    /// Freshness token, passed through.
    pub freshness: Option<String>,
    /// Follow "more results" until exhausted or the page cap.
    pub auto_scroll: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let template = PageRequest::new("");
        Self {
            count: template.count,
            page: template.page,
            safe_search: template.safe_search,
            freshness: None,
            auto_scroll: false,
        }
    }
}

impl SearchSettings {
    /// Builds the first page request for `query`.
    #[must_use]
    pub fn first_request(&self, query: &str) -> PageRequest {
        PageRequest {
            query: query.to_string(),
            count: self.count,
            page: self.page,
            safe_search: self.safe_search,
            freshness: self.freshness.clone(),
        }
    }
}

/// Counters for one run, updated from every worker.
#[derive(Debug, Default)]
pub struct SearchStats {
    queries: AtomicUsize,
    pages: AtomicUsize,
    retries: AtomicUsize,
    new_results: AtomicUsize,
}

impl SearchStats {
    /// Creates a zeroed tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries that completed without a terminal error.
    #[must_use]
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Pages fetched successfully.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.pages.load(Ordering::SeqCst)
    }

    /// Retry waits taken.
    #[must_use]
    pub fn retries(&self) -> usize {
        self.retries.load(Ordering::SeqCst)
    }

    /// URLs that were new to the run and emitted.
    #[must_use]
    pub fn new_results(&self) -> usize {
        self.new_results.load(Ordering::SeqCst)
    }
}

/// Runs individual queries against the search API.
///
/// One runner is built per run and shared (via `Arc`) by every worker.
pub struct QueryRunner {
    client: Arc<dyn SearchClient>,
    limiter: Arc<RateLimiter>,
    keys: Arc<KeyProvider>,
    store: Arc<ResultStore>,
    writer: Arc<dyn LineWriter>,
    policy: RetryPolicy,
    settings: SearchSettings,
    stats: SearchStats,
}

impl std::fmt::Debug for QueryRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRunner")
            .field("limiter", &self.limiter)
            .field("keys", &self.keys.len())
            .field("store_len", &self.store.len())
            .field("policy", &self.policy)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl QueryRunner {
    /// Creates a runner from the shared run components.
    #[must_use]
    pub fn new(
        client: Arc<dyn SearchClient>,
        limiter: Arc<RateLimiter>,
        keys: Arc<KeyProvider>,
        store: Arc<ResultStore>,
        writer: Arc<dyn LineWriter>,
        policy: RetryPolicy,
        settings: SearchSettings,
    ) -> Self {
        Self {
            client,
            limiter,
            keys,
            store,
            writer,
            policy,
            settings,
            stats: SearchStats::new(),
        }
    }

    /// Returns the run counters.
    #[must_use]
    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Returns the shared result store.
    #[must_use]
    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Runs `query` to completion, returning the number of new results.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Cancelled`] once `cancel` fires, or a terminal
    /// variant when a page cannot be fetched within the retry budget.
    #[instrument(skip(self, cancel), fields(query = %query))]
    pub async fn run(&self, query: &str, cancel: &CancellationToken) -> Result<usize, QueryError> {
        let mut request = self.settings.first_request(query);
        let mut new_results = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }

            let page = self.fetch_page(&request, cancel).await?;
            self.stats.pages.fetch_add(1, Ordering::SeqCst);
            new_results += self.record(&page);

            if !self.settings.auto_scroll || !page.more_results_available {
                break;
            }

            if request.is_last_page() {
                warn!(
                    query = %request.query,
                    "pagination stopped at page={MAX_PAGE} (API offset max is {MAX_PAGE})"
                );
                break;
            }

            request = request.next_page();
            debug!(page = request.page, "fetching next page");
        }

        self.stats.queries.fetch_add(1, Ordering::SeqCst);
        Ok(new_results)
    }

    /// Fetches one page, retrying transient failures per the policy.
    async fn fetch_page(
        &self,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> Result<PageResult, QueryError> {
        let mut attempt = 1u32;

        loop {
            if cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }

            self.limiter
                .acquire(cancel)
                .await
                .map_err(|_| QueryError::Cancelled)?;

            let api_key = self.keys.next_key();

            match self.client.search(api_key, request).await {
                Ok((page, meta)) => {
                    log_rate_limit_headers(&meta);
                    debug!(
                        page = request.page,
                        results = page.urls.len(),
                        more = page.more_results_available,
                        "page fetched"
                    );
                    return Ok(page);
                }
                Err(error) => {
                    let class = classify(&error);
                    match self.policy.should_retry(class, attempt) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next_attempt,
                        } => {
                            debug!(
                                page = request.page,
                                attempt = next_attempt,
                                max_attempts = self.policy.max_attempts(),
                                wait_ms = delay.as_millis(),
                                error = %error,
                                "retrying search request"
                            );
                            self.stats.retries.fetch_add(1, Ordering::SeqCst);

                            tokio::select! {
                                biased;
                                () = cancel.cancelled() => return Err(QueryError::Cancelled),
                                () = tokio::time::sleep(delay) => {}
                            }
                            attempt = next_attempt;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(page = request.page, attempt, %reason, "not retrying search request");
                            return Err(QueryError::terminal(&request.query, attempt, class, error));
                        }
                    }
                }
            }
        }
    }

    /// Stores the page's URLs and emits the new ones.
    fn record(&self, page: &PageResult) -> usize {
        let mut new_results = 0;
        for url in &page.urls {
            if self.store.insert_if_absent(url) {
                self.writer.print_line(url);
                new_results += 1;
            }
        }
        self.stats
            .new_results
            .fetch_add(new_results, Ordering::SeqCst);
        new_results
    }
}

fn log_rate_limit_headers(meta: &ResponseMeta) {
    if meta == &ResponseMeta::default() {
        return;
    }
    debug!(
        limit = meta.limit.as_deref().unwrap_or(""),
        policy = meta.policy.as_deref().unwrap_or(""),
        remaining = meta.remaining.as_deref().unwrap_or(""),
        reset = meta.reset.as_deref().unwrap_or(""),
        "rate limit headers"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::output::CollectingWriter;

    /// Replays scripted outcomes and records every call.
    #[derive(Default)]
    struct ScriptedClient {
        script: Mutex<VecDeque<Result<PageResult, SearchError>>>,
        calls: Mutex<Vec<(String, u8)>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<PageResult, SearchError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, u8)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchClient for ScriptedClient {
        async fn search(
            &self,
            api_key: &str,
            request: &PageRequest,
        ) -> Result<(PageResult, ResponseMeta), SearchError> {
            self.calls
                .lock()
                .unwrap()
                .push((api_key.to_string(), request.page));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(PageResult::default()))
                .map(|page| (page, ResponseMeta::default()))
        }
    }

    fn runner(
        client: Arc<ScriptedClient>,
        retry_count: u32,
        auto_scroll: bool,
    ) -> (QueryRunner, Arc<CollectingWriter>) {
        let writer = Arc::new(CollectingWriter::new());
        let runner = QueryRunner::new(
            client,
            Arc::new(RateLimiter::new(1000)),
            Arc::new(KeyProvider::rotating(["k1", "k2"])),
            Arc::new(ResultStore::new()),
            Arc::clone(&writer) as Arc<dyn LineWriter>,
            RetryPolicy::new(retry_count, Duration::from_secs(3)),
            SearchSettings {
                auto_scroll,
                ..SearchSettings::default()
            },
        );
        (runner, writer)
    }

    fn server_error() -> Result<PageResult, SearchError> {
        Err(SearchError::api(500, "500 Internal Server Error", "boom"))
    }

    // ==================== Retry Tests ====================

    #[tokio::test]
    async fn test_retry_exhausted_makes_r_plus_one_attempts() {
        tokio::time::pause();
        let client = Arc::new(ScriptedClient::new((0..10).map(|_| server_error()).collect()));
        let (runner, _) = runner(Arc::clone(&client), 2, false);

        let start = Instant::now();
        let err = runner
            .run("rust", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(client.calls().len(), 3);
        assert!(matches!(err, QueryError::RetryableExhausted { attempts: 3, .. }));
        assert!(start.elapsed() >= Duration::from_secs(6));
        assert_eq!(runner.stats().retries(), 2);
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let client = Arc::new(ScriptedClient::new(vec![Err(SearchError::api(
            400,
            "400 Bad Request",
            "",
        ))]));
        let (runner, _) = runner(Arc::clone(&client), 5, false);

        let err = runner
            .run("rust", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(client.calls().len(), 1);
        assert!(matches!(err, QueryError::NonRetryable { .. }));
        assert_eq!(err.attempts(), 1);
    }

    #[tokio::test]
    async fn test_transport_errors_exhaust_as_transport_failure() {
        tokio::time::pause();
        let client = Arc::new(ScriptedClient::new(vec![
            Err(SearchError::Timeout),
            Err(SearchError::decode("eof")),
        ]));
        let (runner, _) = runner(Arc::clone(&client), 1, false);

        let err = runner
            .run("rust", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::TransportFailure { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_error() {
        tokio::time::pause();
        let client = Arc::new(ScriptedClient::new(vec![
            Err(SearchError::api(429, "429 Too Many Requests", "")),
            Ok(PageResult::new(["https://a.example/"], false)),
        ]));
        let (runner, writer) = runner(Arc::clone(&client), 3, false);

        let new = runner.run("rust", &CancellationToken::new()).await.unwrap();
        assert_eq!(new, 1);
        assert_eq!(writer.lines(), vec!["https://a.example/"]);
        // Each attempt takes the next key.
        let keys: Vec<String> = client.calls().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn test_cancel_during_retry_wait() {
        tokio::time::pause();
        let client = Arc::new(ScriptedClient::new((0..10).map(|_| server_error()).collect()));
        let (runner, _) = runner(Arc::clone(&client), 5, false);
        let runner = Arc::new(runner);
        let cancel = CancellationToken::new();

        let task = {
            let runner = Arc::clone(&runner);
            let cancel = cancel.clone();
            tokio::spawn(async move { runner.run("rust", &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_call() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let (runner, _) = runner(Arc::clone(&client), 3, false);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = runner.run("rust", &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(client.calls().is_empty());
    }

    // ==================== Pagination Tests ====================

    #[tokio::test]
    async fn test_single_page_without_auto_scroll() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(PageResult::new(
            ["https://a.example/"],
            true,
        ))]));
        let (runner, _) = runner(Arc::clone(&client), 0, false);

        runner.run("rust", &CancellationToken::new()).await.unwrap();
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_auto_scroll_stops_when_no_more_results() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(PageResult::new(["https://a.example/"], true)),
            Ok(PageResult::new(["https://b.example/"], true)),
            Ok(PageResult::new(["https://c.example/"], false)),
        ]));
        let (runner, writer) = runner(Arc::clone(&client), 0, true);

        let new = runner.run("rust", &CancellationToken::new()).await.unwrap();
        let pages: Vec<u8> = client.calls().into_iter().map(|(_, p)| p).collect();
        assert_eq!(pages, vec![0, 1, 2]);
        assert_eq!(new, 3);
        assert_eq!(writer.lines().len(), 3);
    }

    #[tokio::test]
    async fn test_auto_scroll_stops_at_page_cap() {
        let script = (0..20)
            .map(|i| Ok(PageResult::new([format!("https://example.com/{i}")], true)))
            .collect();
        let client = Arc::new(ScriptedClient::new(script));
        let (runner, _) = runner(Arc::clone(&client), 0, true);

        runner.run("rust", &CancellationToken::new()).await.unwrap();
        let pages: Vec<u8> = client.calls().into_iter().map(|(_, p)| p).collect();
        assert_eq!(pages, (0..=MAX_PAGE).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_duplicates_are_emitted_once() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(PageResult::new(["https://a.example/", "https://a.example/"], true)),
            Ok(PageResult::new(["https://a.example/", "https://b.example/"], false)),
        ]));
        let (runner, writer) = runner(Arc::clone(&client), 0, true);

        let new = runner.run("rust", &CancellationToken::new()).await.unwrap();
        assert_eq!(new, 2);
        assert_eq!(writer.lines(), vec!["https://a.example/", "https://b.example/"]);
        assert_eq!(runner.store().len(), 2);
    }

    #[tokio::test]
    async fn test_each_page_gets_fresh_attempt_budget() {
        tokio::time::pause();
        let client = Arc::new(ScriptedClient::new(vec![
            server_error(),
            Ok(PageResult::new(["https://a.example/"], true)),
            server_error(),
            Ok(PageResult::new(["https://b.example/"], false)),
        ]));
        let (runner, _) = runner(Arc::clone(&client), 1, true);

        let new = runner.run("rust", &CancellationToken::new()).await.unwrap();
        assert_eq!(new, 2);
        assert_eq!(client.calls().len(), 4);
    }

    #[test]
    fn test_first_request_uses_settings() {
        let settings = SearchSettings {
            count: 5,
            page: 2,
            safe_search: SafeSearch::Moderate,
            freshness: Some("pm".to_string()),
            auto_scroll: true,
        };
        let request = settings.first_request("q");
        assert_eq!(request.count, 5);
        assert_eq!(request.page, 2);
        assert_eq!(request.safe_search, SafeSearch::Moderate);
        assert_eq!(request.freshness.as_deref(), Some("pm"));
    }
}
