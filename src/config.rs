//! Run configuration
//!
//! [`HarvestConfig`] is an immutable snapshot constructed once per run and
//! handed to each component's constructor. Defaults mirror the public
//! SofaScore API's tolerance for scraping traffic.

use std::path::PathBuf;
use std::time::Duration;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://www.sofascore.com/api/v1";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default cap on simultaneous in-flight requests
pub const DEFAULT_MAX_CONCURRENT: usize = 25;

/// Default lower bound of the pre-dispatch pacing delay
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(200);

/// Default upper bound of the pre-dispatch pacing delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(500);

/// Initial backoff delay in milliseconds
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum backoff delay in milliseconds
pub const MAX_BACKOFF_MS: u64 = 30000;

/// Immutable configuration shared by client, store and orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestConfig {
    /// API base URL without trailing slash
    pub base_url: String,
    /// Upper bound for a single request
    pub request_timeout: Duration,
    /// Retries after the first attempt for retryable failures
    pub max_retries: u32,
    /// Global in-flight request cap
    pub max_concurrent: usize,
    /// Minimum pacing delay before each dispatch
    pub min_delay: Duration,
    /// Maximum pacing delay before each dispatch
    pub max_delay: Duration,
    /// Root directory of the document store
    pub data_dir: PathBuf,
    /// Only fetch details for finished matches
    pub fetch_only_finished: bool,
    /// Persist rounds in which no match passes the filter
    pub save_empty_rounds: bool,
    /// First retry delay
    pub backoff_base: Duration,
    /// Retry delay ceiling
    pub backoff_max: Duration,
    /// Optional HTTP proxy
    pub proxy_url: Option<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            data_dir: PathBuf::from("data"),
            fetch_only_finished: true,
            save_empty_rounds: false,
            backoff_base: Duration::from_millis(INITIAL_BACKOFF_MS),
            backoff_max: Duration::from_millis(MAX_BACKOFF_MS),
            proxy_url: None,
        }
    }
}

impl HarvestConfig {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base URL must not be empty".to_string()));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "max concurrent requests must be at least 1".to_string(),
            ));
        }
        if self.min_delay > self.max_delay {
            return Err(ConfigError::Invalid(format!(
                "min delay {:?} exceeds max delay {:?}",
                self.min_delay, self.max_delay
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Base URL with any trailing slash removed.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A field or combination of fields is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
