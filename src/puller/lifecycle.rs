//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::PullEvent;

use super::ModelPuller;

/// How long shutdown waits for transfer tasks to wind down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

impl ModelPuller {
    /// Gracefully shut down the puller
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Refuses new pulls ([`crate::Error::ShuttingDown`])
    /// 2. Cancels every in-flight session and announces it
    /// 3. Stops all transfer tasks and the watchdog
    /// 4. Waits for transfer tasks to finish, up to a timeout
    ///
    /// Sessions stay in the registry so their final state can still be read.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");
        self.accepting_new.store(false, Ordering::SeqCst);

        {
            let active = self.active.lock().await;
            tracing::debug!(active_count = active.len(), "Canceling active pulls");
            for (artifact, entry) in active.iter() {
                if entry.session.cancel() {
                    self.emit_event(PullEvent::Canceled {
                        artifact: artifact.clone(),
                    });
                }
            }
        }
        self.shutdown_token.cancel();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_pulls()).await {
            Ok(()) => tracing::info!("All transfer tasks stopped"),
            Err(_) => {
                tracing::warn!("Timeout waiting for transfer tasks, proceeding with shutdown")
            }
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_active_pulls(&self) {
        loop {
            let active_count = self.active_count().await;
            if active_count == 0 {
                return;
            }
            tracing::debug!(active_count, "Waiting for transfer tasks to stop");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
