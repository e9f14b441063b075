//! Process-wide collection of pull sessions, one per artifact reference.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{ArtifactRef, PullContext, PullState, SessionSnapshot};

use super::event::ProgressEvent;
use super::session::PullSession;

/// Shared handle to one session
///
/// Every read and write goes through the session's own mutex, so a snapshot
/// never observes a half-applied event and independent sessions never contend.
#[derive(Clone, Debug)]
pub struct SessionHandle(Arc<Mutex<PullSession>>);

impl SessionHandle {
    fn new(session: PullSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    // A panic while holding the lock cannot leave a session half-updated in a
    // way later readers care about, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, PullSession> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with shared access to the session
    pub fn with<R>(&self, f: impl FnOnce(&PullSession) -> R) -> R {
        f(&self.lock())
    }

    /// Apply an event; returns the snapshot taken under the same lock, or
    /// `None` when the session is terminal and the event was dropped
    pub fn apply_event(&self, event: &ProgressEvent) -> Option<SessionSnapshot> {
        let mut session = self.lock();
        session.apply_event(event).then(|| session.snapshot())
    }

    /// Record a transport failure; `false` if already terminal
    pub fn fail(&self, error: impl Into<String>) -> bool {
        self.lock().fail(error)
    }

    /// Cancel the session; `false` if already terminal
    pub fn cancel(&self) -> bool {
        self.lock().cancel()
    }

    /// Current state
    pub fn state(&self) -> PullState {
        self.lock().state()
    }

    /// Artifact reference
    pub fn artifact(&self) -> ArtifactRef {
        self.lock().artifact().clone()
    }

    /// Point-in-time view of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// Whether both handles refer to the same session
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Outcome of [`PullRegistry::start_or_attach`]
#[derive(Clone, Debug)]
pub enum Attach {
    /// No in-flight session existed; a new Queued session was registered
    Created(SessionHandle),
    /// An in-flight session already existed and is returned unchanged
    Attached(SessionHandle),
}

impl Attach {
    /// The session, whichever way it was obtained
    pub fn session(&self) -> &SessionHandle {
        match self {
            Attach::Created(session) | Attach::Attached(session) => session,
        }
    }

    /// Whether a new session was created
    pub fn is_new(&self) -> bool {
        matches!(self, Attach::Created(_))
    }
}

/// Outcome of [`PullRegistry::route_event`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Routed {
    /// The event was applied to its session
    Applied,
    /// The session is terminal; the event was dropped
    Ignored,
    /// No session is tracked for the event's artifact
    UnknownRef,
}

/// Outcome of [`PullRegistry::dismiss`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dismissal {
    /// The terminal session was removed
    Removed,
    /// The session is still in flight and was kept
    InFlight,
    /// No session is tracked for the artifact
    Unknown,
}

/// All pull sessions known to this process
///
/// Lock order is always registry map first, then an individual session; a
/// session lock is never held while acquiring the map lock.
#[derive(Debug, Default)]
pub struct PullRegistry {
    sessions: RwLock<HashMap<ArtifactRef, SessionHandle>>,
}

impl PullRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ArtifactRef, SessionHandle>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ArtifactRef, SessionHandle>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the in-flight session for `artifact`, or register a new Queued one
    ///
    /// A terminal session that has not been dismissed yet is replaced by the
    /// new one. There is never more than one in-flight session per artifact.
    pub fn start_or_attach(&self, artifact: &ArtifactRef, context: PullContext) -> Attach {
        let mut sessions = self.write();
        if let Some(existing) = sessions.get(artifact)
            && existing.state().is_in_flight()
        {
            tracing::debug!(artifact = %artifact, "attaching to in-flight pull");
            return Attach::Attached(existing.clone());
        }

        let session = SessionHandle::new(PullSession::new(artifact.clone(), context));
        if sessions.insert(artifact.clone(), session.clone()).is_some() {
            tracing::debug!(artifact = %artifact, "replacing finished pull session");
        }
        tracing::info!(artifact = %artifact, "pull session registered");
        Attach::Created(session)
    }

    /// Handle to the session for `artifact`
    pub fn session(&self, artifact: &ArtifactRef) -> Option<SessionHandle> {
        self.read().get(artifact).cloned()
    }

    /// Deliver an event to the session named by `event.artifact`
    pub fn route_event(&self, event: &ProgressEvent) -> Routed {
        let Some(session) = self.session(&event.artifact) else {
            tracing::debug!(artifact = %event.artifact, "dropping event for unknown pull");
            return Routed::UnknownRef;
        };
        match session.apply_event(event) {
            Some(_) => Routed::Applied,
            None => Routed::Ignored,
        }
    }

    /// Out-of-band failure signal from the transport
    ///
    /// Returns `true` if the session transitioned to Failed.
    pub fn fail(&self, artifact: &ArtifactRef, error: impl Into<String>) -> bool {
        self.session(artifact)
            .is_some_and(|session| session.fail(error))
    }

    /// Cancel the session for `artifact`; `true` if it transitioned to Canceled
    pub fn cancel(&self, artifact: &ArtifactRef) -> bool {
        self.session(artifact)
            .is_some_and(|session| session.cancel())
    }

    /// Remove a terminal session
    ///
    /// In-flight sessions are kept; the caller must cancel them first.
    pub fn dismiss(&self, artifact: &ArtifactRef) -> Dismissal {
        let mut sessions = self.write();
        match sessions.get(artifact).map(SessionHandle::state) {
            None => Dismissal::Unknown,
            Some(state) if state.is_in_flight() => Dismissal::InFlight,
            Some(_) => {
                sessions.remove(artifact);
                tracing::debug!(artifact = %artifact, "pull session dismissed");
                Dismissal::Removed
            }
        }
    }

    /// Snapshot of one session
    pub fn snapshot(&self, artifact: &ArtifactRef) -> Option<SessionSnapshot> {
        self.session(artifact).map(|session| session.snapshot())
    }

    /// Snapshots of every tracked session, ordered by artifact reference
    pub fn list_snapshots(&self) -> Vec<SessionSnapshot> {
        let mut handles: Vec<(ArtifactRef, SessionHandle)> = self
            .read()
            .iter()
            .map(|(artifact, session)| (artifact.clone(), session.clone()))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
            .into_iter()
            .map(|(_, session)| session.snapshot())
            .collect()
    }

    /// In-flight sessions silent for at least `threshold`, with their idle time
    pub fn stale_sessions(
        &self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Vec<(ArtifactRef, Duration)> {
        let handles: Vec<SessionHandle> = self.read().values().cloned().collect();
        let mut stale: Vec<(ArtifactRef, Duration)> = handles
            .iter()
            .filter_map(|handle| {
                handle.with(|session| {
                    session
                        .is_stale(now, threshold)
                        .then(|| (session.artifact().clone(), session.idle_for(now)))
                })
            })
            .collect();
        stale.sort_by(|a, b| a.0.cmp(&b.0));
        stale
    }

    /// Number of tracked sessions
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no sessions are tracked
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
