//! CLI error types and conversions

use crate::config::ConfigError;
use crate::downloader::HarvestError;
use crate::fetcher::TransportError;
use crate::metrics::MetricsError;
use crate::output::OutputError;
use crate::registry::RegistryError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),

    /// Registry error
    #[error("registry error: {0}")]
    RegistryError(#[from] RegistryError),

    /// HTTP client could not be built
    #[error("transport error: {0}")]
    TransportError(#[from] TransportError),

    /// Single fetch operation failed
    #[error("harvest error: {0}")]
    HarvestError(#[from] HarvestError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Metrics exporter error
    #[error("metrics error: {0}")]
    MetricsError(#[from] MetricsError),

    /// Result could not be rendered
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A harvest finished with failed items or was interrupted
    #[error("harvest incomplete: {failed} failed item(s){}", if *.cancelled { ", cancelled" } else { "" })]
    Incomplete {
        /// Failed items
        failed: u64,
        /// Interrupted by cancellation
        cancelled: bool,
    },
}
