//! Pull driver: runs transfers and feeds their progress into the registry.
//!
//! The `ModelPuller` struct and its methods are organized by concern:
//! - [`source`] - Where progress lines come from (HTTP registry stream)
//! - [`control`] - Start, cancel, dismiss and query pulls
//! - [`transfer`] - Per-session transfer task
//! - [`watchdog`] - Stalled-pull detection
//! - `lifecycle` - Shutdown coordination

mod control;
mod lifecycle;
pub mod source;
mod transfer;
mod watchdog;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use source::{HttpPullSource, ProgressSink, PullSource};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::progress::{PullRegistry, SessionHandle};
use crate::types::{ArtifactRef, PullEvent};

/// A transfer task that is still running
#[derive(Clone, Debug)]
pub(crate) struct ActivePull {
    /// Session the task reports into
    pub(crate) session: SessionHandle,
    /// Stops the task's transfer
    pub(crate) token: CancellationToken,
}

/// Main pull driver (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ModelPuller {
    /// Sessions and their aggregated progress
    pub(crate) registry: Arc<PullRegistry>,
    /// Transport performing the pulls
    pub(crate) source: Arc<dyn PullSource>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<PullEvent>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Running transfer tasks by artifact
    pub(crate) active: Arc<tokio::sync::Mutex<HashMap<ArtifactRef, ActivePull>>>,
    /// Cleared during shutdown; new pulls are refused afterwards
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Parent of every transfer token; canceled on shutdown
    pub(crate) shutdown_token: CancellationToken,
}

impl ModelPuller {
    /// Create a puller that pulls from the configured registry over HTTP
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = HttpPullSource::new(&config.registry)?;
        tracing::info!(endpoint = %source.endpoint(), "pull driver initialized");
        Ok(Self::with_source(config, Arc::new(source)))
    }

    /// Create a puller over an arbitrary progress source
    pub fn with_source(config: Config, source: Arc<dyn PullSource>) -> Self {
        let (event_tx, _rx) = broadcast::channel(config.tracker.event_channel_capacity.max(1));
        Self {
            registry: Arc::new(PullRegistry::new()),
            source,
            event_tx,
            config: Arc::new(config),
            active: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Subscribe to pull events
    ///
    /// Each subscriber receives every event independently. A subscriber that
    /// falls behind by more than the channel capacity gets
    /// `RecvError::Lagged` and should resynchronize from [`ModelPuller::list`].
    pub fn subscribe(&self) -> broadcast::Receiver<PullEvent> {
        self.event_tx.subscribe()
    }

    /// The registry holding every tracked session
    pub fn registry(&self) -> &Arc<PullRegistry> {
        &self.registry
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    // send() fails only when nobody is subscribed, which is fine
    pub(crate) fn emit_event(&self, event: PullEvent) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let puller = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(puller, config).await })
    }
}
