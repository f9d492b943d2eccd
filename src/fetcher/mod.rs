//! HTTP fetch primitives
//!
//! The [`Transport`] trait is the only network seam: a plain `GET(url, query)`
//! returning status and body bytes. [`RateLimitedClient`] layers the shared
//! concurrency gate, pacing, timeout and retry policy on top of it and turns
//! bodies into JSON.

pub mod endpoints;
pub mod http;
pub mod retry;
pub mod transport;

pub use http::RateLimitedClient;
pub use retry::BackoffPolicy;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

/// Raw response from a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Bytes,
}

/// Transport-level failures (no HTTP status available).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request exceeded its deadline
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established or was reset
    #[error("connection failed: {0}")]
    Connection(String),

    /// Anything else (invalid URL, TLS setup, builder errors)
    #[error("transport error: {0}")]
    Other(String),
}

/// Generic GET capability consumed by the client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET for `url` with `query` appended.
    async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError>;
}

/// Coarse error class driving retry and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying: timeouts, connection resets, 429, 5xx
    Transient,
    /// Not worth retrying: 404 and other 4xx
    Permanent,
    /// Body was not the expected structure
    Parse,
    /// Work stopped by cancellation
    Cancelled,
}

/// What went wrong on the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Request exceeded the configured timeout
    Timeout,
    /// Connection refused, reset or dropped mid-body
    Connection,
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    Server,
    /// HTTP 404
    NotFound,
    /// Other non-success status
    Client,
    /// Body was not valid JSON
    Parse,
    /// Non-retryable transport failure
    Transport,
    /// Cancelled before completion
    Cancelled,
}

impl FetchErrorKind {
    /// Map onto the error taxonomy.
    pub fn class(self) -> ErrorClass {
        match self {
            FetchErrorKind::Timeout
            | FetchErrorKind::Connection
            | FetchErrorKind::RateLimited
            | FetchErrorKind::Server => ErrorClass::Transient,
            FetchErrorKind::NotFound | FetchErrorKind::Client | FetchErrorKind::Transport => {
                ErrorClass::Permanent
            }
            FetchErrorKind::Parse => ErrorClass::Parse,
            FetchErrorKind::Cancelled => ErrorClass::Cancelled,
        }
    }

    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Connection => "connection",
            FetchErrorKind::RateLimited => "rate_limited",
            FetchErrorKind::Server => "server_error",
            FetchErrorKind::NotFound => "not_found",
            FetchErrorKind::Client => "client_error",
            FetchErrorKind::Parse => "parse",
            FetchErrorKind::Transport => "transport",
            FetchErrorKind::Cancelled => "cancelled",
        }
    }

    /// Classify a non-success HTTP status. Returns `None` for 2xx.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            404 => Some(FetchErrorKind::NotFound),
            429 => Some(FetchErrorKind::RateLimited),
            500..=599 => Some(FetchErrorKind::Server),
            _ => Some(FetchErrorKind::Client),
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&TransportError> for FetchErrorKind {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => FetchErrorKind::Timeout,
            TransportError::Connection(_) => FetchErrorKind::Connection,
            TransportError::Other(_) => FetchErrorKind::Transport,
        }
    }
}

/// Final outcome of a failed [`RateLimitedClient::fetch`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} after {attempts} attempt(s): {message}")]
pub struct FetchError {
    /// Kind of the last failure
    pub kind: FetchErrorKind,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Last HTTP status seen, if any response arrived
    pub last_status: Option<u16>,
    /// Human-readable detail
    pub message: String,
    /// Raw body kept for diagnostics when the payload could not be parsed
    pub raw_body: Option<String>,
}

impl FetchError {
    /// Build an error for a single attempt; the client fills in `attempts`.
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            attempts: 0,
            last_status: None,
            message: message.into(),
            raw_body: None,
        }
    }

    /// Error for work stopped by cancellation.
    pub fn cancelled(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::new(FetchErrorKind::Cancelled, "cancelled")
        }
    }

    /// Taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    /// Upstream reported the resource as nonexistent.
    pub fn is_not_found(&self) -> bool {
        self.kind == FetchErrorKind::NotFound
    }
}

/// Result alias for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;
