//! Harvest requests and per-item status tracking

use serde::{Deserialize, Serialize};
use std::fmt;

use super::season::SeasonSelection;
use crate::DetailCategory;

/// What to harvest in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRequest {
    /// League ids, processed concurrently
    pub leagues: Vec<u64>,
    /// Which seasons of each league to walk
    pub seasons: SeasonSelection,
    /// Detail categories fetched for every selected match
    pub categories: Vec<DetailCategory>,
}

impl HarvestRequest {
    /// All seasons and all categories of `leagues`.
    pub fn new(leagues: Vec<u64>) -> Self {
        Self {
            leagues,
            seasons: SeasonSelection::All,
            categories: DetailCategory::ALL.to_vec(),
        }
    }

    /// Restrict the seasons walked.
    pub fn with_seasons(mut self, seasons: SeasonSelection) -> Self {
        self.seasons = seasons;
        self
    }

    /// Restrict the categories fetched.
    pub fn with_categories(mut self, categories: Vec<DetailCategory>) -> Self {
        self.categories = categories;
        self
    }
}

/// Hierarchy level an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// A league's season list
    Seasons,
    /// One round listing
    Rounds,
    /// One detail category of one match
    Details,
}

impl Level {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Seasons => "seasons",
            Level::Rounds => "rounds",
            Level::Details => "details",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-item lifecycle: `Pending → Fetching → {Stored, Skipped, Failed}`.
///
/// `Skipped` is also reachable straight from `Pending` when the document is
/// already cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Not started
    #[default]
    Pending,
    /// Request in progress
    Fetching,
    /// Fetched and written
    Stored,
    /// Already cached, nothing fetched
    Skipped,
    /// Retries exhausted, permanent error or storage failure
    Failed,
}

impl ItemStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Stored | ItemStatus::Skipped | ItemStatus::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Pending, ItemStatus::Fetching)
                | (ItemStatus::Pending, ItemStatus::Skipped)
                | (ItemStatus::Pending, ItemStatus::Failed)
                | (ItemStatus::Fetching, ItemStatus::Stored)
                | (ItemStatus::Fetching, ItemStatus::Failed)
        )
    }

    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Fetching => "fetching",
            ItemStatus::Stored => "stored",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Failed => "failed",
        }
    }
}

/// One tracked unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Level in the hierarchy
    pub level: Level,
    /// Human-readable identifier, e.g. `match 12436870 statistics`
    pub id: String,
    status: ItemStatus,
}

impl WorkItem {
    /// New pending item.
    pub fn new(level: Level, id: impl Into<String>) -> Self {
        Self {
            level,
            id: id.into(),
            status: ItemStatus::Pending,
        }
    }

    /// Current status.
    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn advance(&mut self, next: ItemStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Attempted an illegal status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid item transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    /// Status before
    pub from: ItemStatus,
    /// Requested status
    pub to: ItemStatus,
}
