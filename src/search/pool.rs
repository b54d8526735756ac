//! Fixed-size worker pool over a shared FIFO query queue.
//!
//! # Overview
//!
//! [`WorkerPool::start`] spawns `threads` Tokio tasks that share one bounded
//! channel receiver. Each worker takes the next query (first available, no
//! priority), runs it through the [`QueryRunner`], and loops until the queue
//! is closed and drained or the run is cancelled.
//!
//! The first terminal query error on any worker is kept, logged, and cancels
//! the whole run; the other workers stop at their next cancellation check.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use brave_search_core::search::{QueryRunner, WorkerPool};
//! # use tokio_util::sync::CancellationToken;
//! # async fn example(runner: Arc<QueryRunner>) {
//! let cancel = CancellationToken::new();
//! let pool = WorkerPool::start(4, runner, cancel.clone());
//! for query in ["rust async", "tokio select"] {
//!     if !pool.submit(query.to_string()).await {
//!         break;
//!     }
//! }
//! if let Some(fatal) = pool.finish().await {
//!     eprintln!("run failed: {fatal}");
//! }
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::runner::{QueryError, QueryRunner};

/// Default worker count.
pub const DEFAULT_THREADS: usize = 1;

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>;
type FatalSlot = Arc<Mutex<Option<QueryError>>>;

/// Running pool of query workers.
#[derive(Debug)]
pub struct WorkerPool {
    sender: mpsc::Sender<String>,
    workers: JoinSet<()>,
    fatal: FatalSlot,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Spawns `threads` workers (at least one) sharing `runner`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    #[instrument(skip(runner, cancel))]
    pub fn start(threads: usize, runner: Arc<QueryRunner>, cancel: CancellationToken) -> Self {
        let threads = threads.max(1);
        let (sender, receiver) = mpsc::channel(threads);
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let fatal: FatalSlot = Arc::new(Mutex::new(None));

        let mut workers = JoinSet::new();
        for worker_id in 0..threads {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(&receiver),
                Arc::clone(&runner),
                Arc::clone(&fatal),
                cancel.clone(),
            ));
        }
        debug!(threads, "worker pool started");

        Self {
            sender,
            workers,
            fatal,
            cancel,
        }
    }

    /// Offers `query` to the queue, waiting while every worker is busy.
    ///
    /// Returns false if the run was cancelled before the query was accepted;
    /// the caller should stop feeding.
    pub async fn submit(&self, query: String) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.sender.send(query) => sent.is_ok(),
        }
    }

    /// Closes the queue and waits for every worker to exit.
    ///
    /// Returns the first terminal query error, if any worker hit one. A worker
    /// that panicked counts as a terminal error and cancels the run.
    pub async fn finish(self) -> Option<QueryError> {
        let Self {
            sender,
            mut workers,
            fatal,
            cancel,
        } = self;
        drop(sender);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task panicked");
                record_fatal(
                    &fatal,
                    QueryError::WorkerPanicked {
                        message: e.to_string(),
                    },
                );
                cancel.cancel();
            }
        }

        fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[instrument(skip(receiver, runner, fatal, cancel))]
async fn worker_loop(
    worker_id: usize,
    receiver: SharedReceiver,
    runner: Arc<QueryRunner>,
    fatal: FatalSlot,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                query = receiver.recv() => query,
            }
        };
        let Some(query) = next else {
            break;
        };

        info!("query: {query}");

        match runner.run(&query, &cancel).await {
            Ok(new_results) => debug!(query = %query, new_results, "query complete"),
            Err(e) if e.is_cancelled() => break,
            Err(e) => {
                error!(
                    query = %query,
                    error = %e,
                    "query failed after {} attempts",
                    e.attempts()
                );
                record_fatal(&fatal, e);
                cancel.cancel();
                break;
            }
        }
    }
    debug!("worker exiting");
}

fn record_fatal(slot: &FatalSlot, error: QueryError) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        *slot = Some(error);
    }
}
