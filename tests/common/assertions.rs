//! Event-driven waits and assertions for integration tests
//!
//! Every helper takes a receiver obtained from `ModelPuller::subscribe()`
//! before the action under test, so no event can slip past.

use pull_progress::{ArtifactRef, PullEvent};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

/// Result of waiting for a pull to finish
#[derive(Debug, PartialEq)]
pub enum WaitResult {
    /// The registry reported success
    Succeeded,
    /// The transfer failed with this error
    Failed(String),
    /// The pull was canceled
    Canceled,
    /// Timeout waiting for a terminal event
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for a pull to reach a terminal state
pub async fn wait_for_outcome(
    events: &mut Receiver<PullEvent>,
    model: &str,
    timeout: Duration,
) -> WaitResult {
    let target = ArtifactRef::from(model);
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(PullEvent::Succeeded { artifact }) if artifact == target => {
                    return WaitResult::Succeeded;
                }
                Ok(PullEvent::Failed { artifact, error }) if artifact == target => {
                    return WaitResult::Failed(error);
                }
                Ok(PullEvent::Canceled { artifact }) if artifact == target => {
                    return WaitResult::Canceled;
                }
                Ok(_) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Collect all events until timeout or predicate is satisfied
pub async fn collect_events_until<F>(
    events: &mut Receiver<PullEvent>,
    timeout: Duration,
    stop_predicate: F,
) -> Vec<PullEvent>
where
    F: Fn(&PullEvent) -> bool,
{
    let mut collected = Vec::new();

    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let should_stop = stop_predicate(&event);
            collected.push(event);
            if should_stop {
                break;
            }
        }
    })
    .await;

    collected
}

/// Assert that a pull succeeded
pub async fn assert_pull_succeeded(
    events: &mut Receiver<PullEvent>,
    model: &str,
    timeout: Duration,
) {
    match wait_for_outcome(events, model, timeout).await {
        WaitResult::Succeeded => {}
        other => panic!("Expected pull {model} to succeed, got {other:?}"),
    }
}

/// Assert that a pull failed, optionally with an error containing `expected`
pub async fn assert_pull_failed(
    events: &mut Receiver<PullEvent>,
    model: &str,
    timeout: Duration,
    expected_error_contains: Option<&str>,
) {
    match wait_for_outcome(events, model, timeout).await {
        WaitResult::Failed(error) => {
            if let Some(expected) = expected_error_contains {
                assert!(
                    error.contains(expected),
                    "Expected error to contain '{expected}', got: {error}"
                );
            }
        }
        other => panic!("Expected pull {model} to fail, got {other:?}"),
    }
}
