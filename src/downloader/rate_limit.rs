//! Shared concurrency gate with randomized pacing
//!
//! One [`RateLimiter`] is shared by every fetch in a run, so the in-flight
//! bound holds across leagues, seasons, rounds, matches and categories alike.

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;

use crate::config::HarvestConfig;
use crate::shutdown::CancellationToken;

/// Counting gate bounding simultaneous requests, plus pacing.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    min_delay: Duration,
    max_delay: Duration,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

/// Slot in the gate; released on drop.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RateLimiter {
    /// Create a gate admitting `max_concurrent` holders, pacing within `[min_delay, max_delay]`.
    pub fn new(max_concurrent: usize, min_delay: Duration, max_delay: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            min_delay: min_delay.min(max_delay),
            max_delay,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Gate described by a run configuration.
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(config.max_concurrent, config.min_delay, config.max_delay)
    }

    /// Wait for a slot. Fails if cancellation wins the race.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<GatePermit, RateLimitError> {
        let permit = match cancel
            .run_until_cancelled(self.semaphore.clone().acquire_owned())
            .await
        {
            None => return Err(RateLimitError::Cancelled),
            Some(result) => result.map_err(|e| RateLimitError::AcquireError(e.to_string()))?,
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        Ok(GatePermit {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }

    /// Draw a pacing delay uniformly from the configured window.
    pub fn pacing_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        if min >= max {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Sleep for a pacing delay unless cancelled first.
    pub async fn pace(&self, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        let delay = self.pacing_delay();
        if delay.is_zero() {
            return Ok(());
        }
        cancel
            .run_until_cancelled(sleep(delay))
            .await
            .ok_or(RateLimitError::Cancelled)
    }

    /// Configured in-flight cap.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Holders right now.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest simultaneous holder count observed so far.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Gate errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateLimitError {
    /// Semaphore closed
    #[error("failed to acquire rate limit permit: {0}")]
    AcquireError(String),

    /// Cancelled while waiting
    #[error("cancelled while waiting for the rate limiter")]
    Cancelled,
}
