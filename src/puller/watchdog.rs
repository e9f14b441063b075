//! Stalled-pull detection.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::types::{ArtifactRef, PullEvent};

use super::ModelPuller;

impl ModelPuller {
    /// Spawn a background task that watches for pulls that stopped reporting
    ///
    /// Every `tracker.watchdog_interval`, in-flight sessions silent for longer
    /// than `tracker.stale_after` are announced with one
    /// [`PullEvent::Stalled`] per idle episode. With `tracker.fail_stalled`
    /// set they are also failed and their transfer is stopped. The task ends
    /// on shutdown.
    pub fn spawn_watchdog(&self) -> tokio::task::JoinHandle<()> {
        let puller = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(puller.config.tracker.watchdog_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut reported = HashSet::new();

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        puller.check_stalled(Utc::now(), &mut reported).await;
                    }
                    _ = puller.shutdown_token.cancelled() => {
                        break;
                    }
                }
            }
            tracing::debug!("watchdog stopped");
        })
    }

    /// One watchdog pass at `now`; returns the artifacts newly reported stalled
    ///
    /// `reported` carries the artifacts already announced in their current
    /// idle episode. An artifact leaves it once it reports progress again (or
    /// finishes), so the next silence is announced anew.
    pub(crate) async fn check_stalled(
        &self,
        now: DateTime<Utc>,
        reported: &mut HashSet<ArtifactRef>,
    ) -> Vec<ArtifactRef> {
        let tracker = &self.config.tracker;
        let stale = self.registry.stale_sessions(now, tracker.stale_after);
        reported.retain(|artifact| stale.iter().any(|(stale_ref, _)| stale_ref == artifact));

        let mut newly_stalled = Vec::new();
        for (artifact, idle) in stale {
            if !reported.insert(artifact.clone()) {
                continue;
            }
            let idle_secs = idle.as_secs();
            tracing::warn!(artifact = %artifact, idle_secs, "pull stalled");
            self.emit_event(PullEvent::Stalled {
                artifact: artifact.clone(),
                idle_secs,
            });

            if tracker.fail_stalled {
                let entry = self.active.lock().await.remove(&artifact);
                if let Some(session) = self.registry.session(&artifact) {
                    self.fail_session(&session, format!("no progress for {idle_secs}s"));
                }
                if let Some(entry) = entry {
                    entry.token.cancel();
                }
            }
            newly_stalled.push(artifact);
        }
        newly_stalled
    }
}
