//! Brave Search Core Library
//!
//! This library provides the query pipeline behind the `brave-search` tool,
//! which runs many search queries concurrently against the Brave Search API
//! and collects the deduplicated result URLs.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`search`] - API client, retry classification, rate limiter, query runner, worker pool
//! - [`keys`] - API key selection (fixed or round-robin)
//! - [`store`] - Run-wide result deduplication
//! - [`output`] - Result line sink and sorted output file
//! - [`input`] - Query intake from flags, files and stdin
//! - [`config`] - Validated run configuration and the persisted key file
//! - [`orchestrator`] - Wires everything together for one run

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod input;
pub mod keys;
pub mod orchestrator;
pub mod output;
pub mod search;
pub mod store;

// Re-export commonly used types
pub use config::{ConfigError, FileConfig, RunConfig};
pub use input::{InputError, QuerySources, collect_queries};
pub use keys::KeyProvider;
pub use orchestrator::{RunError, RunOutcome, run, run_with_client};
pub use output::{CollectingWriter, LineWriter, OutputError, StdoutWriter, write_lines_to_file};
pub use search::{
    BraveClient, PageRequest, PageResult, QueryError, QueryRunner, RateLimiter, RetryPolicy,
    SafeSearch, SearchClient, SearchError, TransportOptions, WorkerPool,
};
pub use store::ResultStore;
