//! Retry policy model
//!
//! Policies are plain serde data so they can live in YAML configuration
//! alongside the functions they apply to.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Retry policy for a wrapped callable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Additional attempts allowed after the first failure
    #[serde(default)]
    pub max_retries: u32,

    /// Delay strategy between attempts
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default)]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Add up to 25% random variation to each delay
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: 0,
            max_delay_ms: default_max_delay(),
            jitter: false,
        }
    }
}

fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_delay() -> u64 {
    30000
}

/// Whole milliseconds covering `delay`: any sub-millisecond remainder rounds
/// up, and durations past `u64::MAX` ms saturate
pub(crate) fn delay_millis(delay: Duration) -> u64 {
    let millis = delay.as_millis() + u128::from(delay.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

impl RetryPolicy {
    /// A fixed-delay policy with `max_retries` retries
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        let delay_ms = delay_millis(delay);
        Self {
            max_retries,
            strategy: RetryStrategy::FixedDelay,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms.max(default_max_delay()),
            ..Self::default()
        }
    }

    /// An exponential backoff policy starting at `initial`
    pub fn exponential(max_retries: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_retries,
            strategy: RetryStrategy::ExponentialBackoff,
            initial_delay_ms: delay_millis(initial),
            max_delay_ms: delay_millis(max),
            ..Self::default()
        }
    }

    /// Check the policy for values no delay calculation can honor
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 0.0 {
            return Err(Error::invalid_config(format!(
                "backoff-multiplier must be a non-negative number, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(Error::invalid_config(format!(
                "max-delay-ms ({}) is below initial-delay-ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        Ok(())
    }
}

/// Delay strategy between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// Retry immediately
    None,

    /// Fixed delay between retries (default)
    #[default]
    FixedDelay,

    /// Exponential backoff
    ExponentialBackoff,

    /// Linear backoff
    LinearBackoff,
}
