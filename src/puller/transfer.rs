//! Transfer task: drives one source pull and reconciles its progress.

use tokio_util::sync::CancellationToken;

use crate::progress::{ProgressEvent, ProgressLine, SessionHandle};
use crate::types::{ArtifactRef, PullEvent, PullRequest, PullState};

use super::ModelPuller;

/// Failure recorded when the stream closes without a success line
pub(crate) const EARLY_END_ERROR: &str = "pull stream ended before success";

impl ModelPuller {
    /// Spawn the task that runs `request` and reports into `session`
    pub(crate) fn spawn_transfer(
        &self,
        request: PullRequest,
        session: SessionHandle,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let puller = self.clone();
        tokio::spawn(async move { puller.run_transfer(request, session, token).await })
    }

    async fn run_transfer(
        self,
        request: PullRequest,
        session: SessionHandle,
        token: CancellationToken,
    ) {
        let artifact = session.artifact();
        tracing::debug!(artifact = %artifact, "transfer started");

        let sink = {
            let puller = self.clone();
            let artifact = artifact.clone();
            let session = session.clone();
            move |line: ProgressLine| puller.handle_line(&artifact, &session, &line)
        };

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.source.pull(&request, &sink) => Some(result),
        };

        match outcome {
            None => tracing::debug!(artifact = %artifact, "transfer stopped"),
            Some(Ok(())) => {
                if session.state().is_in_flight() {
                    self.fail_session(&session, EARLY_END_ERROR);
                }
            }
            Some(Err(e)) => {
                // A cancel racing the error has already settled the session
                if !token.is_cancelled() {
                    self.fail_session(&session, e.to_string());
                }
            }
        }

        self.release(&artifact, &session).await;
    }

    /// Normalize one progress line and apply it to the task's own session
    ///
    /// Routing through the captured handle rather than a registry lookup
    /// keeps a finished task from touching a newer session for the same model.
    pub(crate) fn handle_line(
        &self,
        artifact: &ArtifactRef,
        session: &SessionHandle,
        line: &ProgressLine,
    ) {
        let Some(event) = ProgressEvent::from_line(artifact.clone(), line) else {
            return;
        };
        let Some(snapshot) = session.apply_event(&event) else {
            tracing::trace!(artifact = %artifact, "dropping progress for finished pull");
            return;
        };

        let succeeded = snapshot.state == PullState::Succeeded;
        self.emit_event(PullEvent::Progress { snapshot });
        if succeeded {
            tracing::info!(artifact = %artifact, "pull succeeded");
            self.emit_event(PullEvent::Succeeded {
                artifact: artifact.clone(),
            });
        }
    }

    /// Mark `session` failed and announce it; no-op when already terminal
    pub(crate) fn fail_session(&self, session: &SessionHandle, error: impl Into<String>) {
        let error = error.into();
        if session.fail(error.clone()) {
            let artifact = session.artifact();
            tracing::warn!(artifact = %artifact, error = %error, "pull failed");
            self.emit_event(PullEvent::Failed { artifact, error });
        }
    }

    // Drop the task's entry unless a newer session already replaced it.
    async fn release(&self, artifact: &ArtifactRef, session: &SessionHandle) {
        let mut active = self.active.lock().await;
        if active
            .get(artifact)
            .is_some_and(|entry| entry.session.same_session(session))
        {
            active.remove(artifact);
        }
    }
}
