//! Command-line interface

pub mod commands;
pub mod error;

pub use error::CliError;

use clap::{ArgAction, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    HarvestConfig, DEFAULT_BASE_URL, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_RETRIES,
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS,
};
use crate::downloader::SeasonSelection;
use crate::DetailCategory;

/// Maximum allowed concurrency to avoid upstream blocking
const MAX_CONCURRENCY: usize = 100;

/// Parse a duration given in (possibly fractional) seconds.
fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{s}' is not a valid duration"))
}

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!("concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"));
    }
    Ok(value)
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Sports data harvester
#[derive(Parser, Debug)]
#[command(name = "sports-data-harvester", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    /// API base URL
    #[arg(long, global = true, env = "API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "REQUEST_TIMEOUT", default_value = "10", value_parser = parse_seconds)]
    pub request_timeout: Duration,

    /// Retries after the first attempt (range: 0-10)
    #[arg(long, global = true, env = "MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: u32,

    /// Maximum simultaneous requests across the whole run
    #[arg(long, global = true, env = "MAX_CONCURRENT", default_value_t = DEFAULT_MAX_CONCURRENT,
          value_parser = parse_concurrency)]
    pub max_concurrent: usize,

    /// Minimum pacing delay before each request, in seconds
    #[arg(long, global = true, env = "WAIT_TIME_MIN", default_value = "0.2", value_parser = parse_seconds)]
    pub wait_min: Duration,

    /// Maximum pacing delay before each request, in seconds
    #[arg(long, global = true, env = "WAIT_TIME_MAX", default_value = "0.5", value_parser = parse_seconds)]
    pub wait_max: Duration,

    /// Data root directory
    #[arg(long, global = true, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Only fetch details of finished matches
    #[arg(long, global = true, env = "FETCH_ONLY_FINISHED", default_value_t = true, action = ArgAction::Set)]
    pub fetch_only_finished: bool,

    /// Keep round listings with no selectable match
    #[arg(long, global = true, env = "SAVE_EMPTY_ROUNDS", default_value_t = false, action = ArgAction::Set)]
    pub save_empty_rounds: bool,

    /// HTTP proxy URL
    #[arg(long, global = true, env = "PROXY_URL")]
    pub proxy_url: Option<String>,

    /// Re-fetch documents that are already stored
    #[arg(long, global = true, default_value_t = false)]
    pub force: bool,

    /// League list file (`Name: ID` per line); the built-in list otherwise
    #[arg(long, global = true, env = "LEAGUES_FILE")]
    pub leagues_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this address
    #[arg(long, global = true, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Run configuration from the global flags.
    pub fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig {
            base_url: self.base_url.clone(),
            request_timeout: self.request_timeout,
            max_retries: self.max_retries,
            max_concurrent: self.max_concurrent,
            min_delay: self.wait_min,
            max_delay: self.wait_max,
            data_dir: self.data_dir.clone(),
            fetch_only_finished: self.fetch_only_finished,
            save_empty_rounds: self.save_empty_rounds,
            backoff_base: Duration::from_millis(INITIAL_BACKOFF_MS),
            backoff_max: Duration::from_millis(MAX_BACKOFF_MS),
            proxy_url: self.proxy_url.clone().filter(|p| !p.trim().is_empty()),
        }
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured leagues
    Leagues,

    /// Fetch a league's season list
    Seasons {
        /// League id or name
        #[arg(long)]
        league: String,
    },

    /// Fetch one round listing
    Round {
        /// League id or name
        #[arg(long)]
        league: String,
        /// Season id
        #[arg(long)]
        season: u64,
        /// Round number (from 1)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        round: u32,
    },

    /// Fetch one detail category of a match
    Detail {
        /// Match id
        #[arg(long = "match")]
        match_id: u64,
        /// Category: basic, statistics, team_streaks, pregame_form, h2h, lineups
        #[arg(long, default_value = "basic")]
        category: DetailCategory,
    },

    /// Walk leagues, seasons, rounds and match details into the store
    Harvest {
        /// League ids or names (repeatable); every configured league when omitted
        #[arg(long = "league")]
        leagues: Vec<String>,
        /// Seasons to walk: all, current, latest:N or id,id,...
        #[arg(long, default_value = "current")]
        seasons: SeasonSelection,
        /// Detail categories, comma-separated; all six when omitted
        #[arg(long, value_delimiter = ',')]
        categories: Vec<DetailCategory>,
    },

    /// Write stored matches to CSV
    Export {
        /// Only this league (id or name)
        #[arg(long, conflicts_with = "match_id")]
        league: Option<String>,
        /// Only this match
        #[arg(long = "match")]
        match_id: Option<u64>,
        /// Write the stored season lists to league_seasons.csv instead
        #[arg(long, conflicts_with_all = ["league", "match_id"])]
        seasons: bool,
        /// Output directory (default `{data-dir}/processed`)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Report stored matches that lack required documents
    Report {
        /// Only this league (id or name)
        #[arg(long)]
        league: Option<String>,
        /// Required categories, comma-separated; all but lineups when omitted
        #[arg(long, value_delimiter = ',')]
        categories: Vec<DetailCategory>,
        /// Directory for match_files_report.csv (default `{data-dir}/processed`)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}
