//! Integration tests for the search pipeline against a mock Brave endpoint.
//!
//! These tests drive `BraveClient` and the orchestrator end-to-end over HTTP.

use std::sync::Arc;
use std::time::Duration;

use brave_search_core::{
    BraveClient, CollectingWriter, KeyProvider, LineWriter, PageRequest, QueryError, RunConfig,
    SafeSearch, SearchClient, SearchError, TransportOptions, run,
};
use brave_search_core::search::MAX_ERROR_BODY_BYTES;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/res/v1/web/search";

fn page(urls: &[&str], more: bool) -> serde_json::Value {
    json!({
        "type": "search",
        "query": { "original": "ignored", "more_results_available": more },
        "web": {
            "type": "search",
            "results": urls.iter().map(|u| json!({ "title": "t", "url": u })).collect::<Vec<_>>()
        }
    })
}

fn transport() -> TransportOptions {
    TransportOptions {
        no_proxy: true,
        ..TransportOptions::default()
    }
}

fn config_for(server: &MockServer) -> RunConfig {
    RunConfig {
        rate_limit: 100,
        retry_wait: Duration::from_millis(10),
        endpoint: format!("{}{SEARCH_PATH}", server.uri()),
        transport: transport(),
        ..RunConfig::default()
    }
}

// ==================== Client Tests ====================

#[tokio::test]
async fn test_client_sends_query_params_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("q", "rust async"))
        .and(query_param("count", "10"))
        .and(query_param("offset", "2"))
        .and(query_param("safesearch", "strict"))
        .and(query_param("freshness", "pw"))
        .and(header("X-Subscription-Token", "BSA-key"))
        .and(header("Accept", "application/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Remaining", "1, 1999")
                .set_body_json(page(&["https://a.example/", "", "https://b.example/"], true)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client =
        BraveClient::with_endpoint(&format!("{}{SEARCH_PATH}", server.uri()), &transport())
            .unwrap();
    let request = PageRequest {
        count: 10,
        page: 2,
        safe_search: SafeSearch::Strict,
        freshness: Some(" pw ".to_string()),
        ..PageRequest::new("rust async")
    };

    let (result, meta) = client.search("BSA-key", &request).await.unwrap();
    assert_eq!(result.urls, vec!["https://a.example/", "https://b.example/"]);
    assert!(result.more_results_available);
    assert_eq!(meta.remaining.as_deref(), Some("1, 1999"));
}

#[tokio::test]
async fn test_client_maps_error_status_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(422).set_body_string("  bad freshness value \n"))
        .mount(&server)
        .await;

    let client =
        BraveClient::with_endpoint(&format!("{}{SEARCH_PATH}", server.uri()), &transport())
            .unwrap();
    let err = client
        .search("k", &PageRequest::new("q"))
        .await
        .unwrap_err();

    match err {
        SearchError::Api { status, body, .. } => {
            assert_eq!(status, 422);
            assert_eq!(body, "bad freshness value");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_body_read_is_capped() {
    let server = MockServer::start().await;
    let huge = "e".repeat(MAX_ERROR_BODY_BYTES * 8);
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string(huge))
        .mount(&server)
        .await;

    let client =
        BraveClient::with_endpoint(&format!("{}{SEARCH_PATH}", server.uri()), &transport())
            .unwrap();
    let err = client
        .search("k", &PageRequest::new("q"))
        .await
        .unwrap_err();

    match err {
        SearchError::Api { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body.len(), MAX_ERROR_BODY_BYTES);
            assert!(body.chars().all(|c| c == 'e'));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_invalid_json_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client =
        BraveClient::with_endpoint(&format!("{}{SEARCH_PATH}", server.uri()), &transport())
            .unwrap();
    let err = client
        .search("k", &PageRequest::new("q"))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Decode { .. }), "got {err:?}");
}

// ==================== Pipeline Tests ====================

#[tokio::test]
async fn test_run_retries_rate_limited_page_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["https://ok.example/"], false)))
        .expect(1)
        .mount(&server)
        .await;

    let writer = Arc::new(CollectingWriter::new());
    let outcome = run(
        &config_for(&server),
        KeyProvider::fixed("k"),
        vec!["rust".to_string()],
        Arc::clone(&writer) as Arc<dyn LineWriter>,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(outcome.is_success());
    assert_eq!(writer.lines(), vec!["https://ok.example/"]);
}

#[tokio::test]
async fn test_run_bad_request_is_fatal_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = run(
        &config_for(&server),
        KeyProvider::fixed("k"),
        vec!["rust".to_string()],
        Arc::new(CollectingWriter::new()),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    match outcome.fatal {
        Some(QueryError::NonRetryable { ref query, .. }) => assert_eq!(query, "rust"),
        ref other => panic!("expected NonRetryable, got {other:?}"),
    }
    assert!(!outcome.cancelled_by_signal);
}

#[tokio::test]
async fn test_run_server_errors_exhaust_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = RunConfig {
        retry_count: 2,
        ..config_for(&server)
    };
    let outcome = run(
        &config,
        KeyProvider::fixed("k"),
        vec!["rust".to_string()],
        Arc::new(CollectingWriter::new()),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let fatal = outcome.fatal.unwrap();
    assert!(matches!(fatal, QueryError::RetryableExhausted { attempts: 3, .. }), "got {fatal:?}");
}

#[tokio::test]
async fn test_run_rotates_keys_across_requests() {
    let server = MockServer::start().await;
    for (key, url) in [("k1", "https://one.example/"), ("k2", "https://two.example/")] {
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(header("X-Subscription-Token", key))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[url], false)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let writer = Arc::new(CollectingWriter::new());
    let outcome = run(
        &config_for(&server),
        KeyProvider::rotating(vec!["k1".to_string(), "k2".to_string()]),
        vec!["first".to_string(), "second".to_string()],
        Arc::clone(&writer) as Arc<dyn LineWriter>,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(outcome.is_success());
    let mut lines = writer.lines();
    lines.sort_unstable();
    assert_eq!(lines, vec!["https://one.example/", "https://two.example/"]);
}

#[tokio::test]
async fn test_run_auto_scroll_follows_pages_and_writes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page(&["https://z.example/", "https://m.example/"], true)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("offset", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page(&["https://m.example/", "https://a.example/"], false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.txt");
    let config = RunConfig {
        auto_scroll: true,
        output: Some(output.clone()),
        ..config_for(&server)
    };
    let writer = Arc::new(CollectingWriter::new());

    let outcome = run(
        &config,
        KeyProvider::fixed("k"),
        vec!["rust".to_string()],
        Arc::clone(&writer) as Arc<dyn LineWriter>,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.unique_results, 3);
    assert_eq!(
        writer.lines(),
        vec!["https://z.example/", "https://m.example/", "https://a.example/"]
    );
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "https://a.example/\nhttps://m.example/\nhttps://z.example/\n"
    );
}

#[tokio::test]
async fn test_run_rejects_malformed_proxy() {
    let server = MockServer::start().await;
    let config = RunConfig {
        transport: TransportOptions {
            proxy: Some("ftp://proxy.example:21".to_string()),
            ..transport()
        },
        ..config_for(&server)
    };

    let err = run(
        &config,
        KeyProvider::fixed("k"),
        vec!["rust".to_string()],
        Arc::new(CollectingWriter::new()),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("http transport"), "got: {err}");
}
