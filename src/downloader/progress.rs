//! Aggregated outcome counters
//!
//! Counters are bumped from many concurrent tasks, so each level uses atomics
//! and the failure list sits behind a mutex. [`ProgressTracker::snapshot`]
//! turns them into a plain [`HarvestSummary`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::warn;

use super::job::{ItemStatus, Level};
use crate::metrics;

#[derive(Debug, Default)]
struct LevelCounters {
    stored: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    empty: AtomicU64,
}

impl LevelCounters {
    fn snapshot(&self) -> LevelSummary {
        LevelSummary {
            stored: self.stored.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            empty: self.empty.load(Ordering::SeqCst),
        }
    }
}

/// Outcome counts of one hierarchy level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    /// Fetched and written
    pub stored: u64,
    /// Already cached
    pub skipped: u64,
    /// Failed
    pub failed: u64,
    /// Existed upstream but held nothing to keep (rounds only)
    pub empty: u64,
}

/// One failed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// Level of the item
    pub level: Level,
    /// Identifier, e.g. `league 17 season 61627 round 4`
    pub id: String,
    /// Error description
    pub error: String,
}

/// Final result of a harvest. Always produced, even when items failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestSummary {
    /// Season-list documents
    pub seasons: LevelSummary,
    /// Round documents
    pub rounds: LevelSummary,
    /// Detail documents
    pub details: LevelSummary,
    /// Every failed item, sorted by level then id
    pub failed_items: Vec<FailedItem>,
    /// Cancellation interrupted the run
    pub cancelled: bool,
}

impl HarvestSummary {
    /// Failures across all levels.
    pub fn total_failed(&self) -> u64 {
        self.seasons.failed + self.rounds.failed + self.details.failed
    }

    /// Completed without failures or cancellation.
    pub fn is_clean(&self) -> bool {
        self.total_failed() == 0 && !self.cancelled
    }
}

/// Thread-safe accumulator shared by all tasks of one harvest.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    seasons: LevelCounters,
    rounds: LevelCounters,
    details: LevelCounters,
    failures: Mutex<Vec<FailedItem>>,
}

impl ProgressTracker {
    /// Fresh tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, level: Level) -> &LevelCounters {
        match level {
            Level::Seasons => &self.seasons,
            Level::Rounds => &self.rounds,
            Level::Details => &self.details,
        }
    }

    /// Count an item that reached Stored or Skipped.
    pub fn record(&self, level: Level, status: ItemStatus) {
        let counters = self.counters(level);
        match status {
            ItemStatus::Stored => counters.stored.fetch_add(1, Ordering::SeqCst),
            ItemStatus::Skipped => counters.skipped.fetch_add(1, Ordering::SeqCst),
            ItemStatus::Failed => counters.failed.fetch_add(1, Ordering::SeqCst),
            ItemStatus::Pending | ItemStatus::Fetching => return,
        };
        metrics::record_item(level.as_str(), status.as_str());
    }

    /// Count an item that existed upstream but was not kept.
    pub fn record_empty(&self, level: Level) {
        self.counters(level).empty.fetch_add(1, Ordering::SeqCst);
        metrics::record_item(level.as_str(), "empty");
    }

    /// Count a failure and remember which item failed.
    pub fn record_failure(&self, level: Level, id: impl Into<String>, error: impl ToString) {
        let item = FailedItem {
            level,
            id: id.into(),
            error: error.to_string(),
        };
        warn!(level = %item.level, id = %item.id, error = %item.error, "Item failed");
        self.record(level, ItemStatus::Failed);
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(item);
    }

    /// Current totals.
    pub fn snapshot(&self, cancelled: bool) -> HarvestSummary {
        let mut failed_items = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        failed_items.sort_by(|a, b| {
            (a.level as u8, &a.id).cmp(&(b.level as u8, &b.id))
        });
        HarvestSummary {
            seasons: self.seasons.snapshot(),
            rounds: self.rounds.snapshot(),
            details: self.details.snapshot(),
            failed_items,
            cancelled,
        }
    }
}
