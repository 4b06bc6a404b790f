//! Health, docs, and cross-cutting middleware.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};

use tower::ServiceExt;

use pizza_integration_tests::TestApp;
use pizza_service::middleware::REQUEST_ID_HEADER;

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::spawn().await;

    let health = app.get("/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body, "ok");

    let ready = app.get("/health/ready", None).await;
    assert_eq!(ready.status, StatusCode::OK);
}

#[tokio::test]
async fn test_docs_list_endpoints() {
    let app = TestApp::spawn().await;

    let docs = app.get("/", None).await;
    assert_eq!(docs.status, StatusCode::OK);
    assert!(docs.body["version"].is_string());
    let endpoints = docs.body["endpoints"].as_array().unwrap();
    assert!(
        endpoints
            .iter()
            .any(|e| e["method"] == "POST" && e["path"] == "/order")
    );
}

#[tokio::test]
async fn test_request_id_is_generated_or_echoed() {
    let app = TestApp::spawn().await;

    let generated = app.get("/health", None).await;
    assert!(generated.headers.contains_key(REQUEST_ID_HEADER));

    let request = axum::http::Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "req-123")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-123");
}

#[tokio::test]
async fn test_requests_are_counted() {
    let app = TestApp::spawn().await;

    app.get("/order/menu", None).await;
    app.get("/order/menu", None).await;
    app.request(Method::DELETE, "/auth", None, None).await;

    let snapshot = app.telemetry.metrics().snapshot();
    let count = |method: &str| {
        snapshot
            .http_requests
            .iter()
            .find(|(m, _)| *m == method)
            .map_or(0, |(_, n)| *n)
    };
    assert_eq!(count("GET"), 2);
    assert_eq!(count("DELETE"), 1);
    assert!(snapshot.service_latency_ms.is_some());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::spawn().await;
    assert_eq!(app.get("/nope", None).await.status, StatusCode::NOT_FOUND);
}
