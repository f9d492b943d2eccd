//! Fetch orchestration
//!
//! Walks the entity hierarchy and keeps the store in sync with upstream:
//!
//! 1. **Seasons**: fetch or reuse each league's season list, flag the current season
//! 2. **Rounds**: request rounds 1, 2, 3, … per season until upstream reports one missing
//! 3. **Matches**: keep finished matches (configurable) from every listed round
//! 4. **Details**: fetch all requested categories of each match concurrently
//! 5. **Summary**: Stored/Skipped/Failed counts per level plus failed identifiers
//!
//! Every request at every level goes through the same
//! [`rate_limit::RateLimiter`], so the configured in-flight cap holds for the
//! whole run.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sports_data_harvester::config::HarvestConfig;
//! use sports_data_harvester::downloader::{HarvestRequest, Harvester};
//! use sports_data_harvester::fetcher::transport::ReqwestTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarvestConfig::default();
//! let transport = Arc::new(ReqwestTransport::new(&config)?);
//! let summary = Harvester::new(config, transport)?
//!     .harvest(&HarvestRequest::new(vec![17, 8]))
//!     .await;
//! for failed in &summary.failed_items {
//!     eprintln!("{}: {}", failed.id, failed.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Caching
//!
//! One rule at every level: a document whose key exists is read from disk
//! and never re-fetched unless [`Harvester::with_force`] is set.

pub mod executor;
pub mod job;
pub mod progress;
pub mod rate_limit;
pub mod season;

pub use executor::{Fetched, Harvester, RoundOutcome};
pub use job::{HarvestRequest, InvalidTransition, ItemStatus, Level, WorkItem};
pub use progress::{FailedItem, HarvestSummary, LevelSummary, ProgressTracker};
pub use rate_limit::{GatePermit, RateLimitError, RateLimiter};
pub use season::SeasonSelection;

use crate::config::ConfigError;
use crate::fetcher::{ErrorClass, FetchError};
use crate::store::StoreError;

/// Errors of single orchestration operations
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Network fetch failed after the retry policy gave up
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Document could not be read or written
    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    /// Payload did not have the expected shape
    #[error("unexpected payload for {key}: {message}")]
    Parse {
        /// Store key of the payload
        key: String,
        /// What was wrong
        message: String,
    },

    /// Internal status bookkeeping error
    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Stopped by cancellation
    #[error("cancelled")]
    Cancelled,
}

impl HarvestError {
    /// Whether the operation was interrupted rather than failed.
    pub fn is_cancelled(&self) -> bool {
        match self {
            HarvestError::Cancelled => true,
            HarvestError::Fetch(e) => e.class() == ErrorClass::Cancelled,
            _ => false,
        }
    }
}
