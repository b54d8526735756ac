//! Search API response model.

use reqwest::header::HeaderMap;
use serde::Deserialize;

/// Raw web search response as returned by the Brave API.
///
/// Only the fields the pipeline needs are modelled; everything else in the
/// payload is ignored by serde.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    query: QueryInfo,
    #[serde(default)]
    web: WebResults,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct QueryInfo {
    #[serde(default)]
    more_results_available: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WebResult {
    #[serde(default)]
    url: String,
}

impl SearchResponse {
    /// Converts the raw payload into the page the runner consumes.
    #[must_use]
    pub fn into_page(self) -> PageResult {
        PageResult {
            urls: self
                .web
                .results
                .into_iter()
                .map(|r| r.url)
                .filter(|u| !u.is_empty())
                .collect(),
            more_results_available: self.query.more_results_available,
        }
    }
}

/// One page of results: URLs in API order plus the "more results" flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    /// Result URLs, in the order returned.
    pub urls: Vec<String>,
    /// Whether the API reports further pages.
    pub more_results_available: bool,
}

impl PageResult {
    /// Creates a page from URLs and the continuation flag.
    pub fn new<I, S>(urls: I, more_results_available: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            more_results_available,
        }
    }
}

/// Rate-limit diagnostic headers. Logged at debug level only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// `X-RateLimit-Limit`
    pub limit: Option<String>,
    /// `X-RateLimit-Policy`
    pub policy: Option<String>,
    /// `X-RateLimit-Remaining`
    pub remaining: Option<String>,
    /// `X-RateLimit-Reset`
    pub reset: Option<String>,
}

impl ResponseMeta {
    /// Extracts the rate-limit headers from a response.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            limit: get("x-ratelimit-limit"),
            policy: get("x-ratelimit-policy"),
            remaining: get("x-ratelimit-remaining"),
            reset: get("x-ratelimit-reset"),
        }
    }
}
