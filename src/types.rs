//! Core types for pull-progress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Reference naming the artifact being pulled (e.g. `llama3:8b`)
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Create a new ArtifactRef
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Get the reference as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the reference is empty (such events cannot be routed)
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for ArtifactRef {
    fn from(reference: &str) -> Self {
        Self(reference.to_string())
    }
}

impl From<String> for ArtifactRef {
    fn from(reference: String) -> Self {
        Self(reference)
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pull session state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PullState {
    /// Registered, no progress received yet
    Queued,
    /// Receiving progress
    Active,
    /// The registry reported it is verifying the pulled content
    Verifying,
    /// The registry reported success
    Succeeded,
    /// The transport signalled a failure
    Failed,
    /// Canceled by the consumer
    Canceled,
}

impl PullState {
    /// Whether no further events can change this session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PullState::Succeeded | PullState::Failed | PullState::Canceled
        )
    }

    /// Whether the session still expects events (Queued, Active or Verifying)
    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for PullState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PullState::Queued => "queued",
            PullState::Active => "active",
            PullState::Verifying => "verifying",
            PullState::Succeeded => "succeeded",
            PullState::Failed => "failed",
            PullState::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

/// A request to pull an artifact from the registry
#[derive(Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PullRequest {
    /// Artifact reference to pull
    #[serde(default)]
    pub model: String,

    /// Legacy alias for `model`, used when `model` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Allow insecure connections to the registry
    #[serde(default)]
    pub insecure: bool,

    /// Registry username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Registry password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl PullRequest {
    /// Create a request for the given model with no credentials
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Resolve the artifact reference, falling back to `name` when `model` is empty
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] when neither field names a model.
    pub fn artifact(&self) -> Result<ArtifactRef> {
        let model = self.model.trim();
        if !model.is_empty() {
            return Ok(ArtifactRef::new(model));
        }
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(ArtifactRef::new(name)),
            _ => Err(Error::InvalidRequest("model must not be empty".to_string())),
        }
    }

    /// The auxiliary context stored on the session for this request
    pub fn context(&self) -> PullContext {
        PullContext {
            insecure: self.insecure,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl std::fmt::Debug for PullRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullRequest")
            .field("model", &self.model)
            .field("name", &self.name)
            .field("insecure", &self.insecure)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Request context kept on a session; never exposed in snapshots
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PullContext {
    /// Allow insecure connections to the registry
    pub insecure: bool,
    /// Registry username
    pub username: Option<String>,
    /// Registry password
    pub password: Option<String>,
}

impl std::fmt::Debug for PullContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullContext")
            .field("insecure", &self.insecure)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Presentation view of one part
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PartSnapshot {
    /// Content digest of the part
    pub key: String,
    /// Last phase label reported for the part
    pub status: String,
    /// Completion percentage, 0 to 100
    pub percentage: u8,
}

impl PartSnapshot {
    /// Short display label, e.g. `pulling 6a0746a1ec1a`
    pub fn label(&self) -> String {
        let hex = self
            .key
            .split_once(':')
            .map_or(self.key.as_str(), |(_, hex)| hex);
        let short: String = hex.chars().take(12).collect();
        format!("pulling {short}")
    }
}

/// Point-in-time view of a pull session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Artifact reference
    #[serde(rename = "ref")]
    pub artifact: ArtifactRef,
    /// Session state
    pub state: PullState,
    /// Byte-weighted completion across parts with a known size, 0 to 100
    pub overall_percentage: u8,
    /// Last session-wide status line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Failure reported by the transport (Failed only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the last accepted event arrived
    pub last_event_at: DateTime<Utc>,
    /// Parts in first-seen order
    pub parts: Vec<PartSnapshot>,
}

/// Notification broadcast to subscribers while pulls progress
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PullEvent {
    /// A new pull session was created and its transfer started
    Started {
        /// Artifact reference
        artifact: ArtifactRef,
    },

    /// A session changed; carries the snapshot taken right after the change
    Progress {
        /// Snapshot of the session
        snapshot: SessionSnapshot,
    },

    /// The registry reported success
    Succeeded {
        /// Artifact reference
        artifact: ArtifactRef,
    },

    /// The transfer failed
    Failed {
        /// Artifact reference
        artifact: ArtifactRef,
        /// Error as reported by the transport
        error: String,
    },

    /// The pull was canceled by the consumer
    Canceled {
        /// Artifact reference
        artifact: ArtifactRef,
    },

    /// A finished session was acknowledged and removed
    Dismissed {
        /// Artifact reference
        artifact: ArtifactRef,
    },

    /// No progress arrived for longer than the configured staleness threshold
    Stalled {
        /// Artifact reference
        artifact: ArtifactRef,
        /// Seconds since the last accepted event
        idle_secs: u64,
    },
}

impl PullEvent {
    /// Event name used for the SSE `event:` field
    pub fn kind(&self) -> &'static str {
        match self {
            PullEvent::Started { .. } => "started",
            PullEvent::Progress { .. } => "progress",
            PullEvent::Succeeded { .. } => "succeeded",
            PullEvent::Failed { .. } => "failed",
            PullEvent::Canceled { .. } => "canceled",
            PullEvent::Dismissed { .. } => "dismissed",
            PullEvent::Stalled { .. } => "stalled",
        }
    }
}
