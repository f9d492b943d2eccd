//! # Sports Data Harvester Library
//!
//! Acquires football match data from the SofaScore web API, caches every
//! document on disk, and flattens per-match documents into fixed-schema CSV
//! datasets.
//!
//! ## Features
//!
//! - **Bounded Concurrency**: one shared gate caps in-flight requests across the whole run
//! - **Retry with Backoff**: transient failures (timeouts, 429, 5xx) retry with capped exponential delays
//! - **Idempotent Cache**: documents already on disk are skipped unless a refresh is forced
//! - **Partial-Failure Tolerance**: one failing match never aborts its round, season or league
//! - **Deterministic Flattening**: identical stored documents always produce identical rows
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sports_data_harvester::config::HarvestConfig;
//! use sports_data_harvester::downloader::{HarvestRequest, Harvester, SeasonSelection};
//! use sports_data_harvester::fetcher::transport::ReqwestTransport;
//! use sports_data_harvester::output::CsvExporter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarvestConfig::default();
//! let transport = Arc::new(ReqwestTransport::new(&config)?);
//! let harvester = Harvester::new(config, transport)?;
//!
//! // Premier League, current season only
//! let request = HarvestRequest::new(vec![17]).with_seasons(SeasonSelection::Current);
//! let summary = harvester.harvest(&request).await;
//! println!("stored {} detail documents", summary.details.stored);
//!
//! let report = CsvExporter::new(harvester.store().clone()).export_league(17)?;
//! println!("wrote {:?}", report.paths());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Data flows one way through four layers:
//!
//! - [`fetcher`] - rate-limited HTTP client with retry and backoff over a [`fetcher::Transport`]
//! - [`store`] - hierarchical file-backed document store with atomic writes
//! - [`downloader`] - orchestrator walking league → season → round → match → category
//! - [`output`] - flattening of stored documents into rows, CSV export and completeness reports

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Immutable run configuration
pub mod config;

/// Fetch orchestration across the entity hierarchy
pub mod downloader;

/// HTTP fetch primitives
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// Flattening and CSV export
pub mod output;

/// League name registry
pub mod registry;

/// Cooperative cancellation
pub mod shutdown;

/// On-disk document store
pub mod store;

pub use config::HarvestConfig;
pub use shutdown::CancellationToken;

/// A tracked competition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct League {
    /// Upstream unique-tournament id
    pub id: u64,
    /// Display name
    pub name: String,
}

/// A time-bounded instance of a league's competition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Season {
    /// Upstream season id
    pub id: u64,
    /// League this season belongs to
    pub league_id: u64,
    /// Display name, e.g. "Premier League 24/25"
    pub name: String,
    /// Year label, e.g. "24/25" or "2024"
    pub year: String,
    /// Whether this season was selected as the current one
    pub is_current: bool,
}

/// Match status as reported in a round listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchStatus {
    /// Numeric status code
    #[serde(default)]
    pub code: Option<i64>,
    /// Status type, e.g. "finished", "notstarted", "inprogress"
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human description, e.g. "Ended"
    #[serde(default)]
    pub description: String,
}

impl MatchStatus {
    /// A match counts as finished once upstream reports the "finished" status type.
    pub fn is_finished(&self) -> bool {
        self.kind == "finished"
    }
}

/// One match discovered in a round listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchSummary {
    /// Upstream event id
    pub id: u64,
    /// League id
    pub league_id: u64,
    /// Season id
    pub season_id: u64,
    /// Round number (1-based)
    pub round: u32,
    /// Status at listing time
    pub status: MatchStatus,
}

/// The six kinds of per-match documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailCategory {
    /// Event header: teams, scores, kickoff, venue
    Basic,
    /// Per-period match statistics
    Statistics,
    /// Ongoing team streaks
    TeamStreaks,
    /// Form and table position before kickoff
    PregameForm,
    /// Head-to-head record
    H2H,
    /// Formations and players
    Lineups,
}

impl DetailCategory {
    /// All categories in storage and fetch order.
    pub const ALL: [DetailCategory; 6] = [
        DetailCategory::Basic,
        DetailCategory::Statistics,
        DetailCategory::TeamStreaks,
        DetailCategory::PregameForm,
        DetailCategory::H2H,
        DetailCategory::Lineups,
    ];

    /// File-name slug used in store keys.
    pub fn slug(self) -> &'static str {
        match self {
            DetailCategory::Basic => "basic",
            DetailCategory::Statistics => "statistics",
            DetailCategory::TeamStreaks => "team_streaks",
            DetailCategory::PregameForm => "pregame_form",
            DetailCategory::H2H => "h2h",
            DetailCategory::Lineups => "lineups",
        }
    }

    /// Path suffix appended to `/event/{id}`.
    pub fn endpoint_suffix(self) -> &'static str {
        match self {
            DetailCategory::Basic => "",
            DetailCategory::Statistics => "/statistics",
            DetailCategory::TeamStreaks => "/team-streaks",
            DetailCategory::PregameForm => "/pregame-form",
            DetailCategory::H2H => "/h2h",
            DetailCategory::Lineups => "/lineups",
        }
    }
}

impl fmt::Display for DetailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for DetailCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        DetailCategory::ALL
            .into_iter()
            .find(|c| c.slug() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown category '{s}' (expected one of: basic, statistics, team_streaks, pregame_form, h2h, lineups)"
                )
            })
    }
}
