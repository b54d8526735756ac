//! CLI argument definitions using clap derive macros.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use brave_search_core::config::parse_wait_duration;
use brave_search_core::search::{
    DEFAULT_ENDPOINT, DEFAULT_RATE_LIMIT, DEFAULT_RETRY_COUNT, DEFAULT_THREADS, MAX_COUNT,
};
use brave_search_core::{QuerySources, RunConfig, SafeSearch, TransportOptions};

/// Query the Brave Search API concurrently and collect unique result URLs.
///
/// New URLs are printed to stdout as they arrive; `--output` additionally
/// writes the sorted unique set to a file when the run ends.
#[derive(Parser, Debug)]
#[command(name = "brave-search")]
#[command(author, version, about)]
pub struct Args {
    /// Search query; repeat the flag or pass a comma-separated list
    #[arg(long = "search-query", visible_alias = "sq", value_name = "QUERY")]
    pub search_query: Vec<String>,

    /// File with one query per line; repeat or comma-separate for several files
    #[arg(long = "search-query-file", visible_alias = "sqf", value_name = "FILE")]
    pub search_query_file: Vec<String>,

    /// Read queries from stdin, one per line
    #[arg(long)]
    pub stdin: bool,

    /// API key to use for every request instead of the configured keys
    #[arg(long = "api-key", visible_alias = "ak", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Results per page (1-20)
    #[arg(short = 'c', long, default_value_t = MAX_COUNT, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub count: u8,

    /// First page to request (0-9)
    #[arg(short = 'p', long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub page: u8,

    /// SafeSearch filter: off, moderate or strict
    #[arg(long, default_value_t = SafeSearch::Off, value_parser = clap::value_parser!(SafeSearch))]
    pub safesearch: SafeSearch,

    /// Freshness filter passed through to the API (pd, pw, pm, py or a date range)
    #[arg(long, value_name = "TOKEN")]
    pub freshness: Option<String>,

    /// Follow pagination until results run out or the last page is reached
    #[arg(long)]
    pub all: bool,

    /// Number of concurrent workers
    #[arg(long, default_value_t = DEFAULT_THREADS as u32, value_parser = clap::value_parser!(u32).range(1..))]
    pub threads: u32,

    /// Maximum requests per second across all workers
    #[arg(long = "rate-limit", visible_alias = "rl", default_value_t = DEFAULT_RATE_LIMIT, value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit: u32,

    /// Retries after a failed request (429, 5xx, network errors)
    #[arg(long = "retry-count", default_value_t = DEFAULT_RETRY_COUNT)]
    pub retry_count: u32,

    /// Wait between retries, e.g. 3s, 1500ms, 2m (bare numbers are seconds)
    #[arg(long = "retry-wait-time", default_value = "3s", value_parser = parse_wait_duration, value_name = "DURATION")]
    pub retry_wait_time: Duration,

    /// Write the sorted unique results to this file (overwritten)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Proxy URL (http, https, socks5 or socks5h; http:// is assumed when no scheme is given)
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Proxy credentials as user:pass
    #[arg(long = "proxy-auth", value_name = "USER:PASS")]
    pub proxy_auth: Option<String>,

    /// Ignore proxy settings from the environment
    #[arg(long = "no-proxy")]
    pub no_proxy: bool,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// Config file holding api_keys (default: $XDG_CONFIG_HOME/brave-search/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print only result URLs
    #[arg(short = 's', long)]
    pub silent: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,

    #[arg(long, hide = true, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

/// Single-dash multi-letter flags accepted for compatibility, with their long forms.
const LEGACY_FLAGS: [(&str, &str); 4] = [
    ("-sq", "--search-query"),
    ("-sqf", "--search-query-file"),
    ("-ak", "--api-key"),
    ("-rl", "--rate-limit"),
];

/// Rewrites `-sq`, `-sqf`, `-ak` and `-rl` (also in `-sq=value` form) to
/// their long flags so clap does not read them as bundled short flags.
///
/// Arguments after a bare `--` are left alone.
pub fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut after_separator = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if after_separator {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                after_separator = true;
                return arg;
            }
            let (flag, value) = match text.split_once('=') {
                Some((flag, value)) => (flag, Some(value)),
                None => (text, None),
            };
            match LEGACY_FLAGS.iter().find(|(legacy, _)| *legacy == flag) {
                Some((_, long)) => match value {
                    Some(value) => OsString::from(format!("{long}={value}")),
                    None => OsString::from(*long),
                },
                None => arg,
            }
        })
        .collect()
}

impl Args {
    /// Default tracing filter for the chosen verbosity.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.silent {
            "off"
        } else if self.debug {
            "info,brave_search=debug,brave_search_core=debug"
        } else {
            "info"
        }
    }

    /// Query sources named on the command line.
    #[must_use]
    pub fn query_sources(&self) -> QuerySources {
        QuerySources {
            queries: self.search_query.clone(),
            files: self.search_query_file.clone(),
            use_stdin: self.stdin,
        }
    }

    /// Run options derived from the parsed flags.
    #[must_use]
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig {
            threads: self.threads as usize,
            rate_limit: self.rate_limit,
            retry_count: self.retry_count,
            retry_wait: self.retry_wait_time,
            count: self.count,
            page: self.page,
            safe_search: self.safesearch,
            freshness: self.freshness.clone(),
            auto_scroll: self.all,
            output: self.output.clone(),
            endpoint: self.endpoint.clone(),
            transport: TransportOptions {
                proxy: self.proxy.clone(),
                proxy_auth: self.proxy_auth.clone(),
                no_proxy: self.no_proxy,
                insecure: self.insecure,
            },
        }
    }
}
