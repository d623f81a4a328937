mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{test_config, TestApp, TEST_MEMORY_ID};
use model3d_service::services::providers::mock::MockModelProvider;
use model3d_service::startup::Application;
use service_core::observability::init_metrics;
use tower::ServiceExt;

async fn spawn_app() -> String {
    let app = Application::build(test_config())
        .await
        .expect("Failed to build test application");
    let address = format!("http://127.0.0.1:{}", app.port());

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client
            .get(format!("{}/health", address))
            .send()
            .await
            .is_ok()
        {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    address
}

#[tokio::test]
async fn health_check_works() {
    let address = spawn_app().await;

    let response = reqwest::Client::new()
        .get(format!("{}/health", address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers()["x-content-type-options"],
        "nosniff"
    );

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "model3d-service");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn root_describes_service() {
    let app = TestApp::new(MockModelProvider::succeeding(vec![]));

    let (status, body) = app
        .send(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "model3d-service");
    assert_eq!(body["endpoints"]["generate"], "POST /generate-3d");
}

#[tokio::test]
async fn metrics_endpoint_reports_generation_outcomes() {
    init_metrics().expect("Failed to install metrics recorder");
    let app = TestApp::new(MockModelProvider::succeeding(b"solid".to_vec()));

    let (status, _) = app
        .post_form(&format!("memory_id={}", TEST_MEMORY_ID))
        .await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(
        body.contains("generation_requests_total{outcome=\"success\"}"),
        "missing generation counter in:\n{}",
        body
    );
    assert!(body.contains("generation_duration_seconds"));
    assert!(body.contains("http_requests_total"));
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let app = TestApp::new(MockModelProvider::succeeding(vec![]));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/generate-3d")
                .header("origin", "https://tiniego.com")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers["access-control-allow-origin"],
        "https://tiniego.com"
    );
    assert_eq!(headers["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn cors_ignores_unknown_origin() {
    let app = TestApp::new(MockModelProvider::succeeding(vec![]));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("origin", "https://evil.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}
