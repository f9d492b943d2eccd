//! Rate-limited, retrying JSON client
//!
//! Every attempt passes through the shared [`RateLimiter`]: acquire a slot,
//! wait a randomized pacing delay, send with a timeout, release. Between
//! attempts the slot is released and the client sleeps for the backoff delay.
//!
//! Retries on:
//! - timeouts and connection failures
//! - HTTP 429
//! - HTTP 5xx
//!
//! Fails immediately on:
//! - HTTP 404 and other 4xx
//! - bodies that are not valid JSON

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::retry::BackoffPolicy;
use super::{FetchError, FetchErrorKind, FetchResult, Transport};
use crate::config::HarvestConfig;
use crate::downloader::rate_limit::{RateLimitError, RateLimiter};
use crate::metrics;
use crate::shutdown::CancellationToken;

/// Longest body excerpt carried in an error message
const ERROR_BODY_EXCERPT: usize = 200;

/// Shared fetch primitive for all orchestration levels.
#[derive(Clone)]
pub struct RateLimitedClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    limiter: Arc<RateLimiter>,
    policy: BackoffPolicy,
    request_timeout: Duration,
    cancel: CancellationToken,
}

impl RateLimitedClient {
    /// Create a client.
    ///
    /// # Arguments
    /// * `transport` - GET primitive
    /// * `base_url` - prefix for every endpoint path
    /// * `limiter` - gate shared with every other client of the run
    /// * `policy` - retry budget and delays
    /// * `request_timeout` - per-attempt deadline
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        limiter: Arc<RateLimiter>,
        policy: BackoffPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            limiter,
            policy,
            request_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Client described by a run configuration with its own gate.
    pub fn from_config(transport: Arc<dyn Transport>, config: &HarvestConfig) -> Self {
        Self::new(
            transport,
            config.normalized_base_url(),
            Arc::new(RateLimiter::from_config(config)),
            BackoffPolicy::from_config(config),
            config.request_timeout,
        )
    }

    /// Observe `cancel` at every suspension point.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The shared gate.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The retry policy.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Fetch `endpoint` and parse the body as JSON.
    ///
    /// # Errors
    /// Returns [`FetchError`] carrying the last failure kind, the number of
    /// attempts made and the last HTTP status seen.
    pub async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> FetchResult<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut attempts = 0u32;
        let mut last_status = None;

        loop {
            attempts += 1;
            let mut err = match self.attempt(&url, params, &mut last_status).await {
                Ok(value) => {
                    debug!(url = %url, attempts, "Request succeeded");
                    return Ok(value);
                }
                Err(err) => err,
            };
            err.attempts = attempts;
            err.last_status = last_status;

            if !self.policy.should_retry(err.kind, attempts) {
                if err.kind != FetchErrorKind::Cancelled {
                    debug!(url = %url, attempts, kind = %err.kind, "Giving up");
                }
                return Err(err);
            }

            let delay = self.policy.next_delay(attempts - 1);
            warn!(
                url = %url,
                kind = %err.kind,
                status = ?last_status,
                delay_ms = delay.as_millis() as u64,
                "Attempt {}/{} failed, retrying",
                attempts,
                self.policy.max_attempts()
            );
            metrics::record_retry(err.kind.as_str(), delay);

            if self.cancel.run_until_cancelled(sleep(delay)).await.is_none() {
                return Err(FetchError {
                    last_status,
                    ..FetchError::cancelled(attempts)
                });
            }
        }
    }

    async fn attempt(
        &self,
        url: &str,
        params: &[(&str, String)],
        last_status: &mut Option<u16>,
    ) -> FetchResult<Value> {
        let _permit = self.limiter.acquire(&self.cancel).await.map_err(gate_error)?;
        self.limiter.pace(&self.cancel).await.map_err(gate_error)?;

        let started = Instant::now();
        let sent = self
            .cancel
            .run_until_cancelled(timeout(self.request_timeout, self.transport.get(url, params)))
            .await;

        let response = match sent {
            None => return Err(FetchError::cancelled(0)),
            Some(Err(_elapsed)) => {
                metrics::record_request(None, started.elapsed());
                return Err(FetchError::new(
                    FetchErrorKind::Timeout,
                    format!("no response within {:?}", self.request_timeout),
                ));
            }
            Some(Ok(Err(transport_err))) => {
                metrics::record_request(None, started.elapsed());
                return Err(FetchError::new(
                    FetchErrorKind::from(&transport_err),
                    transport_err.to_string(),
                ));
            }
            Some(Ok(Ok(response))) => response,
        };

        metrics::record_request(Some(response.status), started.elapsed());
        *last_status = Some(response.status);

        if let Some(kind) = FetchErrorKind::from_status(response.status) {
            return Err(FetchError::new(
                kind,
                format!("HTTP {}: {}", response.status, excerpt(&response.body)),
            ));
        }

        serde_json::from_slice::<Value>(&response.body).map_err(|e| FetchError {
            raw_body: Some(String::from_utf8_lossy(&response.body).into_owned()),
            ..FetchError::new(FetchErrorKind::Parse, format!("invalid JSON body: {e}"))
        })
    }
}

fn gate_error(err: RateLimitError) -> FetchError {
    match err {
        RateLimitError::Cancelled => FetchError::cancelled(0),
        RateLimitError::AcquireError(msg) => FetchError::new(FetchErrorKind::Transport, msg),
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    match trimmed.char_indices().nth(ERROR_BODY_EXCERPT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
