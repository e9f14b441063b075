use super::*;
use crate::puller::test_helpers::{ScriptedSource, Step, create_test_puller, wait_for_state};
use crate::types::{PullState, SessionSnapshot};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::time::Duration;
use tower::ServiceExt;


const HALF: &str = r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a0746a1ec1a","total":4000,"completed":2000}"#;
const SUCCESS: &str = r#"{"status":"success"}"#;

/// Puller over a scripted source plus its router
fn test_app(source: ScriptedSource) -> (ModelPuller, Router) {
    let puller = create_test_puller(Arc::new(source));
    let router = create_router(puller.clone(), puller.get_config());
    (puller, router)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn send(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns_and_stops_on_shutdown() {
    let source = Arc::new(ScriptedSource::new());
    let mut config = Config::default();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let puller = crate::puller::test_helpers::create_test_puller_with(source, config);

    let api_handle = puller.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;

    puller.shutdown().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .expect("API server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (_puller, app) = test_app(ScriptedSource::new());

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_restricted_origins() {
    let puller = create_test_puller(Arc::new(ScriptedSource::new()));
    let mut config = (*puller.get_config()).clone();
    config.api.cors_origins = vec!["http://allowed.example".to_string()];
    let app = create_router(puller, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://other.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_cors_disabled() {
    let puller = create_test_puller(Arc::new(ScriptedSource::new()));
    let mut config = (*puller.get_config()).clone();
    config.api.cors_enabled = false;
    let app = create_router(puller, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}
