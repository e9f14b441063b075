//! Pull lifecycle control: start or attach, cancel, dismiss, query.

use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::progress::{Attach, Dismissal};
use crate::types::{ArtifactRef, PullEvent, PullRequest, SessionSnapshot};

use super::{ActivePull, ModelPuller};

impl ModelPuller {
    /// Start a pull, or attach to the one already in flight for the same model
    ///
    /// A transfer task is spawned only when a new session is created; later
    /// callers observe the existing session. Returns the session's snapshot at
    /// the time of the call.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if the request names no model
    /// - [`Error::ShuttingDown`] once [`ModelPuller::shutdown`] has begun
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pull_progress::*;
    /// # async fn example(puller: ModelPuller) -> Result<()> {
    /// let snapshot = puller.pull(PullRequest::new("llama3:8b")).await?;
    /// println!("{} is {}", snapshot.artifact, snapshot.state);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn pull(&self, request: PullRequest) -> Result<SessionSnapshot> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let artifact = request.artifact()?;

        // The task map stays locked until the new session's token is in it,
        // so cancel never finds a session without its token.
        let mut active = self.active.lock().await;
        let session = match self.registry.start_or_attach(&artifact, request.context()) {
            Attach::Created(session) => session,
            Attach::Attached(session) => return Ok(session.snapshot()),
        };

        let token = self.shutdown_token.child_token();
        active.insert(
            artifact.clone(),
            ActivePull {
                session: session.clone(),
                token: token.clone(),
            },
        );
        drop(active);

        self.emit_event(PullEvent::Started {
            artifact: artifact.clone(),
        });
        self.spawn_transfer(request, session.clone(), token);

        Ok(session.snapshot())
    }

    /// Cancel an in-flight pull
    ///
    /// Canceling a pull that already finished is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no session is tracked for `artifact`.
    pub async fn cancel(&self, artifact: &ArtifactRef) -> Result<()> {
        let mut active = self.active.lock().await;
        let Some(session) = self.registry.session(artifact) else {
            return Err(Error::NotFound(artifact.to_string()));
        };

        let canceled = session.cancel();
        if let Some(entry) = active.remove(artifact) {
            entry.token.cancel();
        }
        drop(active);

        if canceled {
            tracing::info!(artifact = %artifact, "pull canceled");
            self.emit_event(PullEvent::Canceled {
                artifact: artifact.clone(),
            });
        }
        Ok(())
    }

    /// Remove a finished pull from the registry
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no session is tracked for `artifact`
    /// - [`Error::InFlight`] if the pull has not reached a terminal state
    pub fn dismiss(&self, artifact: &ArtifactRef) -> Result<()> {
        match self.registry.dismiss(artifact) {
            Dismissal::Removed => {
                self.emit_event(PullEvent::Dismissed {
                    artifact: artifact.clone(),
                });
                Ok(())
            }
            Dismissal::InFlight => Err(Error::InFlight(artifact.to_string())),
            Dismissal::Unknown => Err(Error::NotFound(artifact.to_string())),
        }
    }

    /// Snapshot of one pull
    pub fn snapshot(&self, artifact: &ArtifactRef) -> Option<SessionSnapshot> {
        self.registry.snapshot(artifact)
    }

    /// Snapshots of every tracked pull, ordered by model reference
    pub fn list(&self) -> Vec<SessionSnapshot> {
        self.registry.list_snapshots()
    }

    /// Number of transfer tasks still running
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }
}
