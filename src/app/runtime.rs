use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use brave_search_core::config::{
    ConfigError, ensure_config_file, resolve_default_config_path, resolve_key_provider,
};
use brave_search_core::{LineWriter, StdoutWriter, collect_queries, run};
use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{exit_handler, terminal};
use crate::cli::{self, Args};

pub(crate) async fn run_brave_search() -> Result<ProcessExit> {
    let args = match Args::try_parse_from(cli::normalize_legacy_flags(std::env::args_os())) {
        Ok(args) => args,
        Err(err) => {
            // Help and version go to stdout and are not failures.
            let _ = err.print();
            return Ok(if err.use_stderr() {
                ProcessExit::Usage
            } else {
                ProcessExit::Success
            });
        }
    };

    let no_color = terminal::is_no_color_requested(&args);
    terminal::init_tracing(
        args.default_log_level(),
        terminal::should_force_cli_level(&args),
        no_color,
    );
    terminal::print_banner(args.silent);
    debug!(
        threads = args.threads,
        rate_limit = args.rate_limit,
        retry_count = args.retry_count,
        auto_scroll = args.all,
        "CLI arguments parsed"
    );

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => resolve_default_config_path().ok_or(ConfigError::NoConfigPath)?,
    };
    ensure_config_file(&config_path)?;
    let keys = resolve_key_provider(args.api_key.as_deref(), &config_path)?;

    let queries = collect_queries(&args.query_sources(), io::stdin().lock())
        .context("failed to gather search queries")?;
    debug!(queries = queries.len(), keys = keys.len(), "starting run");

    let cancel = CancellationToken::new();
    let listener = spawn_interrupt_listener(cancel.clone());

    let writer: Arc<dyn LineWriter> = Arc::new(StdoutWriter);
    let result = run(&args.to_run_config(), keys, queries, writer, cancel).await;
    listener.abort();

    let outcome = result?;
    if outcome.cancelled_by_signal {
        info!(unique = outcome.unique_results, "run interrupted");
    }
    Ok(exit_handler::determine_exit_outcome(&outcome))
}

/// Cancels `cancel` on Ctrl-C, or SIGTERM on Unix.
fn spawn_interrupt_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = wait_for_interrupt() => {
                warn!("interrupt received, stopping");
                cancel.cancel();
            }
            () = cancel.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                () = ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            debug!(error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() {
    ctrl_c().await;
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        debug!(error = %e, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
}
