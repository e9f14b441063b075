//! State of one artifact pull: its parts, its lifecycle and its aggregate view.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::types::{ArtifactRef, PullContext, PullState, SessionSnapshot};

use super::event::ProgressEvent;
use super::part::{ByteTally, PartTracker, percent};

/// Session-wide status that ends a pull successfully
const SUCCESS_STATUS: &str = "success";

/// Session-wide status fragment announcing content verification
const VERIFYING_STATUS: &str = "verifying";

/// Tracked state of one pull
///
/// Parts live in an insertion-ordered map so lookup is by digest while the
/// display order stays the order in which digests were first seen. The
/// aggregate byte counts are kept up to date on every event, so
/// [`snapshot`](Self::snapshot) never re-sums the parts.
#[derive(Debug)]
pub struct PullSession {
    artifact: ArtifactRef,
    context: PullContext,
    state: PullState,
    status: Option<String>,
    parts: IndexMap<String, PartTracker>,
    bytes: ByteTally,
    error: Option<String>,
    last_event_at: DateTime<Utc>,
}

impl PullSession {
    /// Create a Queued session
    pub fn new(artifact: ArtifactRef, context: PullContext) -> Self {
        Self {
            artifact,
            context,
            state: PullState::Queued,
            status: None,
            parts: IndexMap::new(),
            bytes: ByteTally::default(),
            error: None,
            last_event_at: Utc::now(),
        }
    }

    /// Apply one event in arrival order
    ///
    /// Returns `false` when the session is already terminal and the event was
    /// dropped.
    pub fn apply_event(&mut self, event: &ProgressEvent) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.last_event_at = Utc::now();

        match event.part_key.as_deref() {
            Some(key) => {
                let order = self.parts.len();
                let part = self
                    .parts
                    .entry(key.to_string())
                    .or_insert_with(|| PartTracker::new(key, order));
                let before = part.contribution();
                part.apply(event);
                self.bytes.replace(before, part.contribution());

                if self.state == PullState::Queued {
                    self.state = PullState::Active;
                }
            }
            None => self.apply_status(&event.status),
        }
        true
    }

    fn apply_status(&mut self, status: &str) {
        if status.eq_ignore_ascii_case(SUCCESS_STATUS) {
            self.state = PullState::Succeeded;
            self.status = Some(status.to_string());
            return;
        }

        self.status = Some(status.to_string());
        if status.to_ascii_lowercase().contains(VERIFYING_STATUS) {
            self.state = PullState::Verifying;
        } else if self.state == PullState::Queued {
            self.state = PullState::Active;
        }
    }

    /// Record a transport failure
    ///
    /// Returns `false` if the session had already reached a terminal state, in
    /// which case the failure is ignored.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = PullState::Failed;
        self.error = Some(error.into());
        true
    }

    /// Cancel the pull; returns `false` if it was already terminal
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = PullState::Canceled;
        true
    }

    /// Artifact reference
    pub fn artifact(&self) -> &ArtifactRef {
        &self.artifact
    }

    /// Request context supplied when the pull was started
    pub fn context(&self) -> &PullContext {
        &self.context
    }

    /// Current state
    pub fn state(&self) -> PullState {
        self.state
    }

    /// Failure message (Failed only)
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Tracker for a part, if it has been seen
    pub fn part(&self, key: &str) -> Option<&PartTracker> {
        self.parts.get(key)
    }

    /// When the last accepted event arrived (creation time if none yet)
    pub fn last_event_at(&self) -> DateTime<Utc> {
        self.last_event_at
    }

    /// Time elapsed since the last accepted event
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_event_at).to_std().unwrap_or_default()
    }

    /// Whether an in-flight session has been silent for at least `threshold`
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.state.is_in_flight() && self.idle_for(now) >= threshold
    }

    /// Byte-weighted completion across parts with a known total
    ///
    /// 100 once Succeeded; 0 while no part has reported its size.
    pub fn overall_percentage(&self) -> u8 {
        if self.state == PullState::Succeeded {
            return 100;
        }
        percent(self.bytes.completed, self.bytes.total)
    }

    /// Point-in-time view of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            artifact: self.artifact.clone(),
            state: self.state,
            overall_percentage: self.overall_percentage(),
            status: self.status.clone(),
            error: self.error.clone(),
            last_event_at: self.last_event_at,
            parts: self.parts.values().map(PartTracker::snapshot).collect(),
        }
    }
}
