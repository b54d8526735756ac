//! One complete run: build the shared components, feed the pool, write the file.
//!
//! # Overview
//!
//! [`run`] validates the [`RunConfig`], builds the rate limiter, result store,
//! search client and [`QueryRunner`], starts the [`WorkerPool`], offers every
//! query (stopping early once the run is cancelled), waits for the workers,
//! and finally writes the sorted unique results if an output path is set.
//!
//! The output file is written even when the run ended with a fatal query
//! error or an interrupt; the [`RunOutcome`] tells the caller which.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::{ConfigError, RunConfig};
use crate::keys::KeyProvider;
use crate::output::{LineWriter, OutputError, write_lines_to_file};
use crate::search::{
    BraveClient, QueryError, QueryRunner, RateLimiter, SearchClient, SearchError, WorkerPool,
};
use crate::store::ResultStore;

/// Errors that stop a run from starting or finishing.
#[derive(Debug, Error)]
pub enum RunError {
    /// Invalid run options.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Intake produced no queries.
    #[error(
        "no search query provided. use --search-query/--sq, --search-query-file/--sqf, or pipe with --stdin"
    )]
    NoQueries,

    /// The HTTP client could not be built (bad proxy, TLS backend failure).
    #[error("failed to build http transport: {0}")]
    Client(#[source] SearchError),

    /// The output file could not be written.
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Result of a run that got as far as processing queries.
#[derive(Debug)]
pub struct RunOutcome {
    /// Unique result URLs collected.
    pub unique_results: usize,
    /// The first terminal query error, if one stopped the run.
    pub fatal: Option<QueryError>,
    /// The run was cancelled from outside (interrupt) rather than by a failure.
    pub cancelled_by_signal: bool,
    /// The output file written, if one was configured.
    pub output_path: Option<PathBuf>,
}

impl RunOutcome {
    /// Returns true when no query failed terminally.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.fatal.is_none()
    }
}

/// Runs `queries` against the Brave Search API.
///
/// # Errors
///
/// See [`run_with_client`]; additionally returns [`RunError::Client`] if the
/// HTTP transport cannot be built from the proxy/TLS options.
pub async fn run(
    config: &RunConfig,
    keys: KeyProvider,
    queries: Vec<String>,
    writer: Arc<dyn LineWriter>,
    cancel: CancellationToken,
) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let client =
        BraveClient::with_endpoint(&config.endpoint, &config.transport).map_err(RunError::Client)?;
    run_with_client(config, Arc::new(client), keys, queries, writer, cancel).await
}

/// Runs `queries` through `client`.
///
/// # Errors
///
/// Returns [`RunError::Config`] for invalid options, [`RunError::NoQueries`]
/// for an empty query list, and [`RunError::Output`] if the output file
/// cannot be written. Query failures are reported in [`RunOutcome::fatal`].
#[instrument(skip_all, fields(queries = queries.len(), threads = config.threads))]
pub async fn run_with_client(
    config: &RunConfig,
    client: Arc<dyn SearchClient>,
    keys: KeyProvider,
    queries: Vec<String>,
    writer: Arc<dyn LineWriter>,
    cancel: CancellationToken,
) -> Result<RunOutcome, RunError> {
    config.validate()?;
    if queries.is_empty() {
        return Err(RunError::NoQueries);
    }

    let store = Arc::new(ResultStore::new());
    let runner = Arc::new(QueryRunner::new(
        client,
        Arc::new(RateLimiter::new(config.rate_limit)),
        Arc::new(keys),
        Arc::clone(&store),
        writer,
        config.retry_policy(),
        config.search_settings(),
    ));

    let pool = WorkerPool::start(config.threads, Arc::clone(&runner), cancel.clone());
    for query in queries {
        if !pool.submit(query).await {
            debug!("run cancelled, no more queries offered");
            break;
        }
    }
    let fatal = pool.finish().await;
    let cancelled_by_signal = fatal.is_none() && cancel.is_cancelled();

    let stats = runner.stats();
    debug!(
        queries = stats.queries(),
        pages = stats.pages(),
        retries = stats.retries(),
        unique = store.len(),
        cancelled_by_signal,
        "run finished"
    );

    let output_path = match &config.output {
        Some(path) => {
            let sorted = store.sorted();
            write_lines_to_file(path, &sorted)?;
            info!("saved: {} ({} unique)", path.display(), sorted.len());
            Some(path.clone())
        }
        None => None,
    };

    Ok(RunOutcome {
        unique_results: store.len(),
        fatal,
        cancelled_by_signal,
        output_path,
    })
}
