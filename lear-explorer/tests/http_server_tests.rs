//! HTTP Server & Routing Integration Tests
//!
//! Drives the full router with an in-memory cache and scripted remote
//! collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use lear_explorer::db::{in_memory_pool, SqliteBookRepository};
use lear_explorer::services::{
    AnalysisRelay, BookAcquisition, ChatEngine, ChatEngineError, ChatStream, ContentFetchError,
    ContentSource, MetadataExtractor, MetadataFetchError,
};
use lear_explorer::{build_router, AppState};

// ============================================================================
// Scripted collaborators
// ============================================================================

struct StubArchive {
    missing: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl ContentSource for StubArchive {
    async fn fetch_text(&self, external_id: i64) -> Result<String, ContentFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.missing {
            Err(ContentFetchError::Status(
                404,
                format!("stub://cache/epub/{}", external_id),
            ))
        } else {
            Ok("It was the best of times".to_string())
        }
    }

    fn catalog_url(&self, external_id: i64) -> String {
        format!("stub://ebooks/{}", external_id)
    }
}

struct StubCatalog;

#[async_trait]
impl MetadataExtractor for StubCatalog {
    async fn extract(&self, _catalog_url: &str) -> Result<Vec<u8>, MetadataFetchError> {
        Ok(br#"{"title":"A Tale","author":"Someone"}"#.to_vec())
    }
}

struct StubEngine {
    refuse: bool,
}

#[async_trait]
impl ChatEngine for StubEngine {
    async fn open_stream(&self, _prompt: &str) -> Result<ChatStream, ChatEngineError> {
        if self.refuse {
            return Err(ChatEngineError::Status {
                status: 401,
                body: "bad token".to_string(),
            });
        }
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Character: John\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Language: English\"}}]}\n",
            "data: [DONE]\n",
        );
        Ok(stream::iter(vec![Ok(Bytes::from_static(body.as_bytes()))]).boxed())
    }
}

struct TestApp {
    app: axum::Router,
    repository: Arc<SqliteBookRepository>,
    archive: Arc<StubArchive>,
}

async fn test_app(missing: bool, refuse: bool) -> TestApp {
    let repository = Arc::new(SqliteBookRepository::new(in_memory_pool().await.unwrap()));
    let archive = Arc::new(StubArchive {
        missing,
        calls: AtomicUsize::new(0),
    });
    let acquisition =
        BookAcquisition::new(repository.clone(), archive.clone(), Arc::new(StubCatalog));
    let relay = AnalysisRelay::new(Arc::new(StubEngine { refuse }));

    TestApp {
        app: build_router(AppState::new(acquisition, relay)),
        repository,
        archive,
    }
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

// ============================================================================
// Pages
// ============================================================================

#[tokio::test]
async fn test_root_route_serves_html() {
    let test = test_app(false, false).await;

    let (status, headers, body) = get(&test.app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers["content-type"].to_str().unwrap().contains("text/html"));
    assert!(body.contains("No books cached yet."));
}

#[tokio::test]
async fn test_book_page_fetches_and_renders() {
    let test = test_app(false, false).await;

    let (status, _, body) = get(&test.app, "/books/12345").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h1>A Tale</h1>"));
    assert!(body.contains("It was the best of times"));
    assert!(body.contains("/books/12345/analyze"));

    // Now listed on the index
    let (_, _, index) = get(&test.app, "/").await;
    assert!(index.contains(r#"<a href="/books/12345">A Tale</a> by Someone"#));
}

#[tokio::test]
async fn test_health_endpoint() {
    let test = test_app(false, false).await;

    let (status, _, body) = get(&test.app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "lear-explorer");
}

// ============================================================================
// JSON API
// ============================================================================

#[tokio::test]
async fn test_api_book_is_fetched_once_then_cached() {
    let test = test_app(false, false).await;

    let (status, _, body) = get(&test.app, "/api/books/12345").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["external_id"], 12345);
    assert_eq!(json["content"], "It was the best of times");
    assert_eq!(json["metadata"]["title"], "A Tale");
    assert_eq!(json["metadata"]["author"], "Someone");

    let (status, _, _) = get(&test.app, "/api/books/12345").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(test.archive.calls.load(Ordering::SeqCst), 1);
    assert_eq!(test.repository.count_by_external_id(12345).await.unwrap(), 1);

    let (_, _, list) = get(&test.app, "/api/books").await;
    let list: Value = serde_json::from_str(&list).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["title"], "A Tale");
}

#[tokio::test]
async fn test_non_numeric_id_is_bad_request() {
    let test = test_app(false, false).await;

    for uri in ["/api/books/abc", "/books/abc", "/books/abc/analyze"] {
        let (status, _, body) = get(&test.app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }
    assert_eq!(test.archive.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unavailable_book_is_not_found_and_not_cached() {
    let test = test_app(true, false).await;

    let (status, _, body) = get(&test.app, "/api/books/999999").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["code"], "BOOK_UNAVAILABLE");
    assert_eq!(test.repository.count_by_external_id(999999).await.unwrap(), 0);
}

// ============================================================================
// Analysis stream
// ============================================================================

#[tokio::test]
async fn test_analysis_stream_framing() {
    let test = test_app(false, false).await;

    let (status, headers, body) = get(&test.app, "/books/12345/analyze").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["connection"], "keep-alive");
    assert_eq!(
        body,
        "event: CustomEvent\ndata: {\"analysis\": \"Character: John\"}\n\n\
         event: CustomEvent\ndata: {\"analysis\": \"Language: English\"}\n\n\
         event: Close\ndata: Stream Ended\n\n"
    );
}

#[tokio::test]
async fn test_analysis_open_failure_is_bad_gateway() {
    let test = test_app(false, true).await;

    let (status, headers, body) = get(&test.app, "/books/12345/analyze").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_ne!(headers["content-type"], "text/event-stream");
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_analysis_of_unavailable_book_is_not_found() {
    let test = test_app(true, false).await;

    let (status, _, _) = get(&test.app, "/books/5/analyze").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
