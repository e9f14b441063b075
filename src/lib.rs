//! # pull-progress
//!
//! Progress aggregation and reconciliation for multi-part model pulls.
//!
//! A registry pull streams progress for several content-addressed parts at
//! once, with duplicates, regressions and late lines mixed in. This crate
//! folds that stream into one coherent, monotonic view per pull:
//! - **Per-part tracking** - totals, completed bytes and phase per digest
//! - **Session state** - Queued, Active, Verifying, Succeeded, Failed, Canceled
//! - **Registry** - one in-flight session per model, shared by every caller
//! - **Driver** - runs pulls against an Ollama-compatible registry and
//!   broadcasts events; optional REST/SSE API on top
//!
//! ## Quick Start
//!
//! ```no_run
//! use pull_progress::{Config, ModelPuller, PullRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::load("pull-progress.json")?;
//!     config.apply_env()?;
//!
//!     let puller = ModelPuller::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = puller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     puller.pull(PullRequest::new("llama3:8b")).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Progress reconciliation engine: parts, sessions, registry
pub mod progress;
/// Pull driver (decomposed into focused submodules)
pub mod puller;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, Config, RegistryConfig, RegistryHost, TrackerConfig};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use progress::{
    PartTracker, ProgressEvent, ProgressLine, PullRegistry, PullSession, SessionHandle,
};
pub use puller::{HttpPullSource, ModelPuller, PullSource};
pub use types::{
    ArtifactRef, PartSnapshot, PullContext, PullEvent, PullRequest, PullState, SessionSnapshot,
};

/// Helper function to run the puller with graceful signal handling.
///
/// Waits for a termination signal and then calls the puller's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use pull_progress::{Config, ModelPuller, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let puller = ModelPuller::new(Config::default())?;
///     puller.spawn_watchdog();
///     puller.spawn_api_server();
///
///     // Run with automatic signal handling
///     run_with_shutdown(puller).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(puller: ModelPuller) -> Result<()> {
    wait_for_signal().await;
    puller.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
