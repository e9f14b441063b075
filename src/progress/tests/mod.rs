use super::*;
use crate::types::{ArtifactRef, PullContext, PullState};
use std::sync::Arc;
use std::time::Duration;


fn registry_with(artifact: &str) -> (PullRegistry, ArtifactRef) {
    let registry = PullRegistry::new();
    let artifact = ArtifactRef::from(artifact);
    registry.start_or_attach(&artifact, PullContext::default());
    (registry, artifact)
}

fn part(artifact: &str, key: &str, total: Option<u64>, completed: Option<u64>) -> ProgressEvent {
    ProgressEvent::part(artifact, key, total, completed).with_status("downloading")
}

#[test]
fn start_or_attach_twice_returns_same_session() {
    let registry = PullRegistry::new();
    let artifact = ArtifactRef::from("llama3");

    let first = registry.start_or_attach(&artifact, PullContext::default());
    assert!(first.is_new());
    registry.route_event(&part("llama3", "d1", Some(100), Some(30)));

    let second = registry.start_or_attach(&artifact, PullContext::default());
    assert!(!second.is_new());
    assert!(first.session().same_session(second.session()));
    assert_eq!(second.session().snapshot().parts[0].percentage, 30);
    assert_eq!(registry.len(), 1);
}

#[test]
fn attach_keeps_original_context() {
    let registry = PullRegistry::new();
    let artifact = ArtifactRef::from("private/model");
    let context = PullContext {
        insecure: true,
        username: Some("alice".into()),
        password: Some("secret".into()),
    };
    registry.start_or_attach(&artifact, context.clone());
    let attach = registry.start_or_attach(&artifact, PullContext::default());
    assert!(attach.session().with(|s| s.context() == &context));
}

#[test]
fn start_after_terminal_state_creates_fresh_session() {
    let (registry, artifact) = registry_with("m");
    registry.route_event(&part("m", "d1", Some(10), Some(10)));
    registry.route_event(&ProgressEvent::status("m", "success"));

    let again = registry.start_or_attach(&artifact, PullContext::default());
    assert!(again.is_new());
    let snap = again.session().snapshot();
    assert_eq!(snap.state, PullState::Queued);
    assert!(snap.parts.is_empty());
    assert_eq!(registry.len(), 1);
}

#[test]
fn route_to_unknown_ref_is_dropped() {
    let registry = PullRegistry::new();
    let routed = registry.route_event(&part("ghost", "d1", Some(1), Some(1)));
    assert_eq!(routed, Routed::UnknownRef);
    assert!(registry.is_empty());
}

#[test]
fn route_reports_ignored_events_for_terminal_sessions() {
    let (registry, artifact) = registry_with("m");
    assert_eq!(
        registry.route_event(&part("m", "a", Some(10), Some(1))),
        Routed::Applied
    );
    assert!(registry.cancel(&artifact));
    assert_eq!(
        registry.route_event(&part("m", "a", Some(10), Some(9))),
        Routed::Ignored
    );
}

#[test]
fn cancel_and_fail_unknown_ref_are_noops() {
    let registry = PullRegistry::new();
    let artifact = ArtifactRef::from("nope");
    assert!(!registry.cancel(&artifact));
    assert!(!registry.fail(&artifact, "boom"));
    assert_eq!(registry.dismiss(&artifact), Dismissal::Unknown);
}

#[test]
fn fail_is_reached_exactly_once_and_stable() {
    let (registry, artifact) = registry_with("m");
    assert!(registry.fail(&artifact, "pull model manifest: file does not exist"));
    assert!(!registry.fail(&artifact, "later error"));
    assert!(!registry.cancel(&artifact));
    registry.route_event(&ProgressEvent::status("m", "success"));

    let snap = registry.snapshot(&artifact).unwrap();
    assert_eq!(snap.state, PullState::Failed);
    assert_eq!(
        snap.error.as_deref(),
        Some("pull model manifest: file does not exist")
    );
}

#[test]
fn dismiss_removes_only_terminal_sessions() {
    let (registry, artifact) = registry_with("m");
    registry.route_event(&part("m", "a", Some(10), Some(1)));
    assert_eq!(registry.dismiss(&artifact), Dismissal::InFlight);

    registry.cancel(&artifact);
    assert_eq!(registry.dismiss(&artifact), Dismissal::Removed);
    assert!(registry.snapshot(&artifact).is_none());
    assert_eq!(registry.dismiss(&artifact), Dismissal::Unknown);
}

#[test]
fn terminal_sessions_stay_listed_until_dismissed() {
    let (registry, artifact) = registry_with("m");
    registry.route_event(&ProgressEvent::status("m", "success"));

    let listed = registry.list_snapshots();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].state, PullState::Succeeded);
    // reading does not consume the terminal state
    assert_eq!(registry.list_snapshots()[0].state, PullState::Succeeded);

    registry.dismiss(&artifact);
    assert!(registry.list_snapshots().is_empty());
}

#[test]
fn list_snapshots_is_sorted_by_ref() {
    let registry = PullRegistry::new();
    for name in ["qwen2", "llama3", "mistral"] {
        registry.start_or_attach(&ArtifactRef::from(name), PullContext::default());
    }
    let refs: Vec<String> = registry
        .list_snapshots()
        .into_iter()
        .map(|s| s.artifact.to_string())
        .collect();
    assert_eq!(refs, ["llama3", "mistral", "qwen2"]);
}

#[test]
fn stale_sessions_lists_only_silent_in_flight_pulls() {
    let registry = PullRegistry::new();
    let quiet = ArtifactRef::from("quiet");
    let done = ArtifactRef::from("done");
    registry.start_or_attach(&quiet, PullContext::default());
    registry.start_or_attach(&done, PullContext::default());
    registry.route_event(&ProgressEvent::status("done", "success"));

    let later = chrono::Utc::now() + chrono::Duration::seconds(120);
    let stale = registry.stale_sessions(later, Duration::from_secs(60));
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].0, quiet);
    assert!(stale[0].1 >= Duration::from_secs(119));

    assert!(
        registry
            .stale_sessions(chrono::Utc::now(), Duration::from_secs(60))
            .is_empty()
    );
}

#[test]
fn registry_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PullRegistry>();
    assert_send_sync::<SessionHandle>();
    let _shared: Arc<PullRegistry> = Arc::new(PullRegistry::new());
}
