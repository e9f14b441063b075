//! Progress records as they arrive from the registry and their normalized form.

use serde::{Deserialize, Serialize};

use crate::types::ArtifactRef;

/// One raw line of the registry's newline-delimited JSON progress stream
///
/// Numeric fields are kept as `f64` so that anything the transport sends
/// (negative, fractional, missing) can be decoded and normalized later instead
/// of failing the whole stream.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressLine {
    /// Phase label, e.g. "pulling manifest", "verifying sha256 digest", "success"
    #[serde(default)]
    pub status: String,

    /// Content digest of the layer this line describes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Expected size of the layer in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,

    /// Bytes transferred so far for the layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<f64>,

    /// Failure reported by the registry; such a line is not a progress event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressLine {
    /// The failure message carried by this line, if any
    pub fn failure(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

/// A normalized progress event for one artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Artifact the event belongs to
    pub artifact: ArtifactRef,
    /// Phase label
    pub status: String,
    /// Part digest; `None` for session-wide status lines
    pub part_key: Option<String>,
    /// Expected part size; `None` when unknown
    pub total: Option<u64>,
    /// Bytes transferred so far for the part
    pub completed: Option<u64>,
}

impl ProgressEvent {
    /// A session-wide status line (no part key)
    pub fn status(artifact: impl Into<ArtifactRef>, status: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            status: status.into(),
            part_key: None,
            total: None,
            completed: None,
        }
    }

    /// A progress report for one part
    pub fn part(
        artifact: impl Into<ArtifactRef>,
        key: impl Into<String>,
        total: Option<u64>,
        completed: Option<u64>,
    ) -> Self {
        Self {
            artifact: artifact.into(),
            status: String::new(),
            part_key: Some(key.into()),
            total: total.filter(|t| *t > 0),
            completed,
        }
    }

    /// Replace the phase label
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Normalize a raw stream line
    ///
    /// Returns `None` when the line cannot be routed: the artifact reference is
    /// empty, or the line carries a failure (which travels on the separate
    /// failure channel). Byte counts that are negative, NaN or infinite become 0,
    /// fractions are truncated, and a total of 0 means "unknown".
    pub fn from_line(artifact: ArtifactRef, line: &ProgressLine) -> Option<Self> {
        if artifact.is_empty() || line.failure().is_some() {
            return None;
        }

        let part_key = line
            .digest
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Some(Self {
            artifact,
            status: line.status.clone(),
            part_key,
            total: line.total.map(clamp_bytes).filter(|t| *t > 0),
            completed: line.completed.map(clamp_bytes),
        })
    }
}

/// Clamp a reported byte count into `u64`
pub(crate) fn clamp_bytes(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    // `as` saturates at u64::MAX for values beyond range.
    value.trunc() as u64
}
