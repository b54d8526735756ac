//! Validated options for one run.

use std::path::PathBuf;
use std::time::Duration;

use crate::search::{
    DEFAULT_ENDPOINT, DEFAULT_RATE_LIMIT, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_WAIT,
    DEFAULT_THREADS, MAX_COUNT, MAX_PAGE, MIN_COUNT, RetryPolicy, SafeSearch, SearchSettings,
    TransportOptions,
};

use super::ConfigError;

/// Immutable configuration for one run.
///
/// Built once at startup (by the CLI or a library caller) and only read
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Worker count (>= 1).
    pub threads: usize,
    /// Global requests per second (>= 1).
    pub rate_limit: u32,
    /// Retries after the first attempt of each page.
    pub retry_count: u32,
    /// Wait between attempts.
    pub retry_wait: Duration,
    /// Results per page (1..=20).
    pub count: u8,
    /// First page to fetch (0..=9).
    pub page: u8,
    /// SafeSearch mode.
    pub safe_search: SafeSearch,
    /// Freshness token, passed through to the API.
    pub freshness: Option<String>,
    /// Follow pagination until exhausted or the page cap.
    pub auto_scroll: bool,
    /// Where to write the sorted unique results, if anywhere.
    pub output: Option<PathBuf>,
    /// Search API endpoint.
    pub endpoint: String,
    /// Proxy and TLS settings.
    pub transport: TransportOptions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            rate_limit: DEFAULT_RATE_LIMIT,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_wait: DEFAULT_RETRY_WAIT,
            count: MAX_COUNT,
            page: 0,
            safe_search: SafeSearch::Off,
            freshness: None,
            auto_scroll: false,
            output: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            transport: TransportOptions::default(),
        }
    }
}

impl RunConfig {
    /// Checks every bound.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first violated bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads < 1 {
            return Err(ConfigError::validation("--threads must be at least 1"));
        }
        if self.rate_limit < 1 {
            return Err(ConfigError::validation("--rate-limit must be at least 1"));
        }
        if !(MIN_COUNT..=MAX_COUNT).contains(&self.count) {
            return Err(ConfigError::validation(format!(
                "--count must be between {MIN_COUNT} and {MAX_COUNT}"
            )));
        }
        if self.page > MAX_PAGE {
            return Err(ConfigError::validation(format!(
                "--page must be between 0 and {MAX_PAGE}"
            )));
        }
        Ok(())
    }

    /// Retry policy derived from the retry options.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count, self.retry_wait)
    }

    /// Per-query search parameters.
    #[must_use]
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            count: self.count,
            page: self.page,
            safe_search: self.safe_search,
            freshness: self.freshness.clone(),
            auto_scroll: self.auto_scroll,
        }
    }
}

/// Parses a wait duration such as `3s`, `1500ms`, `2m`, `1m30s` or `1.5s`.
///
/// A bare number is taken as seconds. Supported units: `ns`, `us`, `ms`, `s`,
/// `m`, `h`.
///
/// # Errors
///
/// Returns a message describing the malformed input.
pub fn parse_wait_duration(raw: &str) -> Result<Duration, String> {
    let input = raw.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    if let Ok(secs) = input.parse::<f64>() {
        return nanos_to_duration(secs * 1e9, raw);
    }

    let mut total_nanos = 0.0_f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {raw:?}"))?;
        if number_len == 0 {
            return Err(format!("invalid duration {raw:?}"));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration {raw:?}"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            unit => {
                return Err(format!(
                    "unknown unit {unit:?} in duration {raw:?} (use ms, s, m or h)"
                ));
            }
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }

    nanos_to_duration(total_nanos, raw)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn nanos_to_duration(nanos: f64, raw: &str) -> Result<Duration, String> {
    if !nanos.is_finite() || nanos < 0.0 || nanos >= u64::MAX as f64 {
        return Err(format!("invalid duration {raw:?}"));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}
