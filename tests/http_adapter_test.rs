//! Tests for the HTTP boundary: status mapping, content types, error bodies

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use kodegen_tools_htmlrender::http::build_router;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

mod common;
use common::{FakeControl, eventually, executor, start_supervisor};

const BODY_LIMIT: usize = 64 * 1024;

async fn router(control: &Arc<FakeControl>) -> Router {
    let supervisor = start_supervisor(control, 1).await;
    build_router(executor(&supervisor, Duration::from_secs(5), None), BODY_LIMIT)
}

fn post_json(body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, bytes.to_vec())
}

fn error_message(body: &[u8]) -> String {
    let value: Value = serde_json::from_slice(body).unwrap();
    value["error"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn test_non_post_is_method_not_allowed() {
    let control = FakeControl::new();
    let router = router(&control).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error_message(&body), "Method not allowed");
}

#[tokio::test]
async fn test_wrong_method_on_health_uses_error_body() {
    let control = FakeControl::new();
    let router = router(&control).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, content_type, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(error_message(&body), "Method not allowed");
}

#[tokio::test]
async fn test_non_json_content_type_is_rejected() {
    let control = FakeControl::new();
    let router = router(&control).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"html":"<p/>"}"#))
        .unwrap();
    let (status, content_type, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(
        error_message(&body),
        "Unexpected Content-Type: only supports 'application/json'"
    );
}

#[tokio::test]
async fn test_bad_bodies_are_client_errors() {
    let control = FakeControl::new();
    let router = router(&control).await;

    for body in [
        "{not json",
        "[1, 2, 3]",
        r#"{"html": 1}"#,
        r#"{"format": "png"}"#,
        r#"{"html": "<p/>", "url": "https://example.com"}"#,
        r#"{"html": "<p/>", "format": "gif"}"#,
        r#"{"html": "<p/>", "options": 5}"#,
    ] {
        let (status, _, response) = send(&router, post_json(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert!(!error_message(&response).is_empty());
    }
    assert_eq!(control.renders_started(), 0);
}

#[tokio::test]
async fn test_missing_source_message() {
    let control = FakeControl::new();
    let router = router(&control).await;

    let (status, _, body) = send(&router, post_json("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "Missing 'html' (or 'url') property in request body, or it is not a string"
    );
}

#[tokio::test]
async fn test_png_render_returns_image_bytes() {
    let control = FakeControl::new();
    let router = router(&control).await;

    let (status, content_type, body) =
        send(&router, post_json(r#"{"html":"<h1>hi</h1>","format":"png"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert!(body.starts_with(b"\x89PNG\r\n\x1a\n"));
}

#[tokio::test]
async fn test_default_format_is_jpeg() {
    let control = FakeControl::new();
    let router = router(&control).await;

    let (status, content_type, body) =
        send(&router, post_json(r#"{"url":"https://example.com"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/jpeg"));
    assert!(body.starts_with(b"\xff\xd8\xff"));
}

#[tokio::test]
async fn test_format_inside_options_selects_pdf() {
    let control = FakeControl::new();
    let router = router(&control).await;

    let (status, content_type, body) = send(
        &router,
        post_json(r#"{"html":"<p>x</p>","options":{"format":"pdf","pdf":{"landscape":true}}}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
    assert!(body.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let control = FakeControl::new();
    let supervisor = start_supervisor(&control, 1).await;
    let router = build_router(executor(&supervisor, Duration::from_secs(5), None), 32);

    let body = format!(r#"{{"html":"{}"}}"#, "x".repeat(256));
    let (status, _, _) = send(&router, post_json(body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(control.renders_started(), 0);
}

#[tokio::test]
async fn test_render_timeout_is_server_error() {
    let control = FakeControl::new();
    control.set_render_delay(Duration::from_secs(10));
    let supervisor = start_supervisor(&control, 1).await;
    let router = build_router(
        executor(&supervisor, Duration::from_millis(50), None),
        BODY_LIMIT,
    );

    let (status, _, body) = send(&router, post_json(r#"{"html":"<p/>"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_message(&body).contains("timed out"));
}

#[tokio::test]
async fn test_queue_timeout_is_service_unavailable() {
    let control = FakeControl::new();
    control.set_render_delay(Duration::from_millis(500));
    let supervisor = start_supervisor(&control, 1).await;
    let router = build_router(
        executor(
            &supervisor,
            Duration::from_secs(5),
            Some(Duration::from_millis(50)),
        ),
        BODY_LIMIT,
    );

    let busy = {
        let router = router.clone();
        tokio::spawn(async move { send(&router, post_json(r#"{"html":"<p/>"}"#)).await })
    };
    eventually(|| supervisor.current_pool().stats().checked_out == 1).await;

    let (status, _, _) = send(&router, post_json(r#"{"html":"<p/>"}"#)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (busy_status, _, _) = busy.await.unwrap();
    assert_eq!(busy_status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_supervisor_status() {
    let control = FakeControl::new();
    let router = router(&control).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, content_type, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["state"], "ready");
    assert_eq!(value["generation"], 1);
    assert_eq!(value["pool"]["capacity"], 1);
}
