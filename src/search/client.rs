//! Search API client.
//!
//! [`SearchClient`] is the seam the pipeline talks to: one call, one page,
//! one classified outcome. [`BraveClient`] is the production implementation
//! on top of `reqwest`; tests plug in deterministic fakes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder, Proxy, Response, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use super::error::{MAX_ERROR_BODY_BYTES, SearchError};
use super::request::PageRequest;
use super::response::{PageResult, ResponseMeta, SearchResponse};

/// Brave web search endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Header carrying the API key.
const SUBSCRIPTION_TOKEN_HEADER: &str = "X-Subscription-Token";

/// Overall request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

/// TCP/TLS connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(12);

/// Executes one search API call.
///
/// Implementations must not retry or sleep: retry, backoff and rate limiting
/// belong to the [`QueryRunner`](super::QueryRunner).
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Fetches one page for `request`, authenticating with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Api`] for non-200 responses and a transport or
    /// decode variant for everything else.
    async fn search(
        &self,
        api_key: &str,
        request: &PageRequest,
    ) -> Result<(PageResult, ResponseMeta), SearchError>;
}

/// Proxy and TLS settings for the HTTP transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Proxy URL (`http://`, `https://`, `socks5://`, `socks5h://`; scheme defaults to `http://`).
    pub proxy: Option<String>,
    /// Proxy credentials as `user:pass` (or `user`), used when the URL has none.
    pub proxy_auth: Option<String>,
    /// Ignore proxy environment variables.
    pub no_proxy: bool,
    /// Disable TLS certificate verification.
    pub insecure: bool,
}

/// Brave Search API client.
///
/// Created once per run and shared by all workers; `reqwest::Client` pools
/// connections internally.
#[derive(Debug, Clone)]
pub struct BraveClient {
    client: Client,
    endpoint: Url,
}

impl BraveClient {
    /// Creates a client for the public Brave endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidRequest`] if the proxy URL is malformed
    /// or uses an unsupported scheme, and [`SearchError::Network`] if the
    /// underlying client cannot be built.
    pub fn new(options: &TransportOptions) -> Result<Self, SearchError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, options)
    }

    /// Creates a client against a custom endpoint (used by tests).
    ///
    /// # Errors
    ///
    /// Same as [`BraveClient::new`], plus [`SearchError::InvalidRequest`] for
    /// an unparseable endpoint.
    #[instrument(level = "debug", skip(options), fields(proxy = options.proxy.is_some(), insecure = options.insecure))]
    pub fn with_endpoint(endpoint: &str, options: &TransportOptions) -> Result<Self, SearchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SearchError::invalid_request(format!("invalid endpoint {endpoint}: {e}")))?;
        let client = build_client(options)?;
        debug!(endpoint = %endpoint, "created search client");
        Ok(Self { client, endpoint })
    }

    fn request_url(&self, request: &PageRequest) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &request.query);
            pairs.append_pair("count", &request.count.to_string());
            pairs.append_pair("offset", &request.page.to_string());
            pairs.append_pair("safesearch", request.safe_search.as_str());
            if let Some(freshness) = request.freshness_param() {
                pairs.append_pair("freshness", freshness);
            }
        }
        url
    }
}

#[async_trait]
impl SearchClient for BraveClient {
    #[instrument(skip(self, api_key, request), fields(query = %request.query, page = request.page))]
    async fn search(
        &self,
        api_key: &str,
        request: &PageRequest,
    ) -> Result<(PageResult, ResponseMeta), SearchError> {
        let url = self.request_url(request);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(SUBSCRIPTION_TOKEN_HEADER, api_key)
            .send()
            .await
            .map_err(SearchError::transport)?;

        let status = response.status();
        let meta = ResponseMeta::from_headers(response.headers());

        if status != StatusCode::OK {
            let body = read_error_body(response).await;
            return Err(SearchError::api(status.as_u16(), status.to_string(), &body));
        }

        let bytes = response.bytes().await.map_err(SearchError::transport)?;
        let parsed: SearchResponse =
            serde_json::from_slice(&bytes).map_err(|e| SearchError::decode(e.to_string()))?;

        Ok((parsed.into_page(), meta))
    }
}

/// Reads at most [`MAX_ERROR_BODY_BYTES`] of an error response body.
///
/// Best effort: a read failure keeps whatever arrived before it.
async fn read_error_body(mut response: Response) -> String {
    let mut body = Vec::new();
    while body.len() < MAX_ERROR_BODY_BYTES {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(MAX_ERROR_BODY_BYTES - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "failed to read error response body");
                break;
            }
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Returns the User-Agent sent with every request.
#[must_use]
pub fn default_user_agent() -> String {
    format!("brave-search/{}", env!("CARGO_PKG_VERSION"))
}

fn build_client(options: &TransportOptions) -> Result<Client, SearchError> {
    let mut builder: ClientBuilder = Client::builder()
        .user_agent(default_user_agent())
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .gzip(true);

    if options.no_proxy {
        builder = builder.no_proxy();
    }

    if options.insecure {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(raw) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let proxy_url = parse_proxy_url(raw, options.proxy_auth.as_deref())?;
        let proxy = Proxy::all(proxy_url.as_str())
            .map_err(|e| SearchError::invalid_request(format!("invalid proxy url: {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|source| SearchError::Network { source })
}

/// Parses a proxy URL, defaulting the scheme to `http://` and applying
/// `user:pass` credentials when the URL carries none.
///
/// # Errors
///
/// Returns [`SearchError::InvalidRequest`] for empty, unparseable or
/// unsupported-scheme proxy URLs.
pub fn parse_proxy_url(raw: &str, auth: Option<&str>) -> Result<Url, SearchError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SearchError::invalid_request("empty proxy url"));
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| SearchError::invalid_request(format!("invalid proxy url: {e}")))?;

    let scheme = url.scheme().to_ascii_lowercase();
    if !matches!(scheme.as_str(), "http" | "https" | "socks5" | "socks5h") {
        return Err(SearchError::invalid_request(format!(
            "unsupported proxy scheme: {scheme:?} (use http(s):// or socks5://)"
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(SearchError::invalid_request("invalid proxy url: missing host"));
    }

    if let Some(auth) = auth.filter(|a| !a.is_empty())
        && url.username().is_empty()
    {
        let (user, pass) = match auth.split_once(':') {
            Some((user, pass)) => (user, Some(pass)),
            None => (auth, None),
        };
        url.set_username(user)
            .and_then(|()| url.set_password(pass))
            .map_err(|()| SearchError::invalid_request("proxy url cannot carry credentials"))?;
    }

    Ok(url)
}
