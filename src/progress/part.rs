//! Progress state for a single content-addressed part of an artifact.

use crate::types::PartSnapshot;

use super::event::ProgressEvent;

/// Bytes a set of parts contributes to the overall percentage
///
/// Only parts with a known, non-zero total contribute. `completed` is capped
/// at `total` per part so an over-reporting part cannot push the aggregate
/// past 100. Sums of per-part `u64` counts cannot overflow `u128`, so the
/// running totals stay exact however large the reported sizes are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ByteTally {
    pub(crate) completed: u128,
    pub(crate) total: u128,
}

impl ByteTally {
    /// Swap one part's previous contribution for its current one
    pub(crate) fn replace(&mut self, before: ByteTally, after: ByteTally) {
        self.completed = self.completed - before.completed + after.completed;
        self.total = self.total - before.total + after.total;
    }
}

/// Rounded percentage of `completed` over `total`, clamped to 0..=100
pub(crate) fn percent(completed: u128, total: u128) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    // round half up
    let pct = (completed * 200 + total) / (total * 2);
    pct.min(100) as u8
}

/// Progress of one part, owned by its [`PullSession`](super::PullSession)
#[derive(Clone, Debug)]
pub struct PartTracker {
    key: String,
    display_order: usize,
    status: String,
    total: Option<u64>,
    completed: u64,
}

impl PartTracker {
    /// Create a tracker for a part first seen at position `display_order`
    pub fn new(key: impl Into<String>, display_order: usize) -> Self {
        Self {
            key: key.into(),
            display_order,
            status: String::new(),
            total: None,
            completed: 0,
        }
    }

    /// Fold an event for this part into the tracker
    ///
    /// The total follows the latest value reported, completed bytes only ever
    /// move forward (a regression is absorbed), and the status label is
    /// replaced unconditionally.
    pub fn apply(&mut self, event: &ProgressEvent) {
        if let Some(total) = event.total.filter(|t| *t > 0) {
            self.total = Some(total);
        }
        if let Some(completed) = event.completed {
            self.completed = self.completed.max(completed);
        }
        self.status.clone_from(&event.status);
    }

    /// Part digest
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Index of first appearance within the session
    pub fn display_order(&self) -> usize {
        self.display_order
    }

    /// Last reported phase label
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Expected size, once known
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Highest completed byte count seen so far
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Completion percentage, 0 while the total is unknown
    pub fn percentage(&self) -> u8 {
        self.total
            .map_or(0, |total| percent(self.completed.into(), total.into()))
    }

    /// Presentation view of this part
    pub fn snapshot(&self) -> PartSnapshot {
        PartSnapshot {
            key: self.key.clone(),
            status: self.status.clone(),
            percentage: self.percentage(),
        }
    }

    pub(crate) fn contribution(&self) -> ByteTally {
        match self.total {
            Some(total) if total > 0 => ByteTally {
                completed: self.completed.min(total).into(),
                total: total.into(),
            },
            _ => ByteTally::default(),
        }
    }
}
