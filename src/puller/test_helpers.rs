//! Shared test helpers: a scripted progress source and puller factories.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::progress::ProgressLine;
use crate::puller::{ModelPuller, ProgressSink, PullSource};
use crate::types::{ArtifactRef, PullRequest, PullState};

/// One step of a scripted pull
#[derive(Clone)]
pub(crate) enum Step {
    /// Deliver a raw NDJSON progress line
    Line(&'static str),
    /// Block until the gate is opened
    Wait(Arc<Notify>),
    /// End the pull with a transport error
    Fail(&'static str),
    /// Never finish (until the transfer is dropped)
    Hang,
}

/// A progress source replaying a fixed script per model
#[derive(Default)]
pub(crate) struct ScriptedSource {
    scripts: Mutex<HashMap<String, Vec<Step>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(self, model: &str, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().insert(model.to_string(), steps);
        self
    }

    /// Number of pulls started against this source
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PullSource for ScriptedSource {
    async fn pull(&self, request: &PullRequest, sink: ProgressSink<'_>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let model = request.artifact()?.to_string();
        let steps = self
            .scripts
            .lock()
            .unwrap()
            .get(&model)
            .cloned()
            .unwrap_or_default();

        for step in steps {
            match step {
                Step::Line(raw) => {
                    let line: ProgressLine = serde_json::from_str(raw)?;
                    sink(line);
                }
                Step::Wait(gate) => gate.notified().await,
                Step::Fail(message) => return Err(Error::Transport(message.to_string())),
                Step::Hang => std::future::pending::<()>().await,
            }
        }
        Ok(())
    }
}

/// Puller over `source` with default configuration
pub(crate) fn create_test_puller(source: Arc<ScriptedSource>) -> ModelPuller {
    ModelPuller::with_source(Config::default(), source)
}

/// Puller over `source` with a custom configuration
pub(crate) fn create_test_puller_with(
    source: Arc<ScriptedSource>,
    config: Config,
) -> ModelPuller {
    ModelPuller::with_source(config, source)
}

/// Poll until the session for `model` reaches `state` (panics after 5s)
pub(crate) async fn wait_for_state(puller: &ModelPuller, model: &str, state: PullState) {
    let artifact = ArtifactRef::from(model);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = puller.snapshot(&artifact).map(|s| s.state);
        if current == Some(state) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{model} never reached {state}, last seen {current:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until no transfer task is running (panics after 5s)
pub(crate) async fn wait_until_idle(puller: &ModelPuller) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while puller.active_count().await > 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "transfer tasks still running"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
