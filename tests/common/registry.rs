//! A fake Ollama-compatible registry served by wiremock

use pull_progress::{Config, ModelPuller, RegistryHost};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A realistic two-layer pull: manifest, weights, params, verify, success
pub const TWO_LAYER_PULL: &[&str] = &[
    r#"{"status":"pulling manifest"}"#,
    r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a0746a1ec1a","total":4000,"completed":0}"#,
    r#"{"status":"pulling 4fa551d4f938","digest":"sha256:4fa551d4f938","total":1000,"completed":1000}"#,
    r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a0746a1ec1a","total":4000,"completed":2000}"#,
    r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a0746a1ec1a","total":4000,"completed":1500}"#,
    r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a0746a1ec1a","total":4000,"completed":4000}"#,
    r#"{"status":"verifying sha256 digest"}"#,
    r#"{"status":"writing manifest"}"#,
    r#"{"status":"success"}"#,
];

/// Join lines into an NDJSON body
pub fn ndjson(lines: &[&str]) -> String {
    lines.iter().map(|l| format!("{l}\n")).collect()
}

/// Start a mock registry with no routes mounted
pub async fn start_registry() -> MockServer {
    MockServer::start().await
}

/// Serve `lines` as the pull stream for `model`
pub async fn mount_pull(server: &MockServer, model: &str, lines: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .and(body_partial_json(serde_json::json!({ "model": model })))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(lines)))
        .mount(server)
        .await;
}

/// Serve `lines` for `model`, but only after `delay`
pub async fn mount_slow_pull(server: &MockServer, model: &str, lines: &[&str], delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .and(body_partial_json(serde_json::json!({ "model": model })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ndjson(lines))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Answer pulls of `model` with an HTTP error status and body
pub async fn mount_pull_error(server: &MockServer, model: &str, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .and(body_partial_json(serde_json::json!({ "model": model })))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Configuration pointing at the mock registry
pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.registry.host =
        RegistryHost::parse(&server.uri()).expect("mock server URI should parse");
    config
}

/// Puller pulling from the mock registry
pub fn puller_for(server: &MockServer) -> ModelPuller {
    ModelPuller::new(config_for(server)).expect("puller should build")
}
