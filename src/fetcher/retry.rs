//! Retry eligibility and backoff delays
//!
//! Pure functions only; the client owns the sleeping.

use std::time::Duration;

use super::{ErrorClass, FetchErrorKind};
use crate::config::HarvestConfig;

/// Exponential backoff with a ceiling and a retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base: Duration,
    /// Delay ceiling
    pub max: Duration,
}

impl BackoffPolicy {
    /// Create a policy.
    pub fn new(max_retries: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_retries,
            base,
            max,
        }
    }

    /// Policy described by a run configuration.
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(config.max_retries, config.backoff_base, config.backoff_max)
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped at `max`.
    pub fn next_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Whether an error of this kind may be retried at all.
    pub fn is_retryable(&self, kind: FetchErrorKind) -> bool {
        kind.class() == ErrorClass::Transient
    }

    /// Whether another attempt is allowed after `attempts_made` attempts failed with `kind`.
    pub fn should_retry(&self, kind: FetchErrorKind, attempts_made: u32) -> bool {
        self.is_retryable(kind) && attempts_made <= self.max_retries
    }

    /// Total attempts this policy allows for a persistently retryable failure.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&HarvestConfig::default())
    }
}
