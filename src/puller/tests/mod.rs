use super::test_helpers::*;
use super::*;
use crate::error::Error;
use crate::types::{PullRequest, PullState};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;


const MANIFEST: &str = r#"{"status":"pulling manifest"}"#;
const WEIGHTS_HALF: &str = r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a0746a1ec1a","total":4000,"completed":2000}"#;
const WEIGHTS_DONE: &str = r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a0746a1ec1a","total":4000,"completed":4000}"#;
const VERIFYING: &str = r#"{"status":"verifying sha256 digest"}"#;
const SUCCESS: &str = r#"{"status":"success"}"#;

/// Script of a complete, uneventful pull
fn full_pull() -> Vec<Step> {
    vec![
        Step::Line(MANIFEST),
        Step::Line(WEIGHTS_HALF),
        Step::Line(WEIGHTS_DONE),
        Step::Line(VERIFYING),
        Step::Line(SUCCESS),
    ]
}

/// Receive the next event, panicking if none arrives within 5s
async fn next_event(rx: &mut Receiver<PullEvent>) -> PullEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Drain events until one of kind `kind` shows up
async fn wait_for_event(rx: &mut Receiver<PullEvent>, kind: &str) -> PullEvent {
    loop {
        let event = next_event(rx).await;
        if event.kind() == kind {
            return event;
        }
    }
}

#[tokio::test]
async fn test_puller_is_cloneable_and_shares_state() {
    let source = Arc::new(ScriptedSource::new().script("llama3", full_pull()));
    let puller = create_test_puller(source);
    let clone = puller.clone();

    puller.pull(PullRequest::new("llama3")).await.unwrap();
    wait_for_state(&clone, "llama3", PullState::Succeeded).await;
    assert_eq!(clone.list().len(), 1);
    assert!(Arc::ptr_eq(puller.registry(), clone.registry()));
}

#[tokio::test]
async fn test_new_rejects_invalid_config() {
    let mut config = Config::default();
    config.tracker.event_channel_capacity = 0;
    let result = ModelPuller::new(config);
    assert!(matches!(result, Err(Error::Config { .. })));
}
