//! Retry delay strategies and predicates
//!
//! Delays are derived from a [`RetryPolicy`]; predicates decide which
//! failures consume retry budget and which propagate immediately.

use rand::Rng;
use std::fmt::Display;
use std::time::Duration;

use super::policy::{RetryPolicy, RetryStrategy};

/// Calculate the delay before retry number `retry` (1-indexed)
///
/// # Example
///
/// ```rust
/// use callwrap_core::retry::{calculate_delay, RetryPolicy, RetryStrategy};
///
/// let policy = RetryPolicy {
///     max_retries: 3,
///     strategy: RetryStrategy::ExponentialBackoff,
///     backoff_multiplier: 2.0,
///     initial_delay_ms: 1000,
///     max_delay_ms: 30000,
///     jitter: false,
/// };
///
/// assert_eq!(calculate_delay(&policy, 1).as_millis(), 1000);
/// assert_eq!(calculate_delay(&policy, 2).as_millis(), 2000);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, retry: u32) -> Duration {
    let retry_index = retry.saturating_sub(1);

    let base_delay_ms = match policy.strategy {
        RetryStrategy::None => 0,

        RetryStrategy::FixedDelay => policy.initial_delay_ms,

        RetryStrategy::ExponentialBackoff => {
            let multiplier = policy.backoff_multiplier.powf(retry_index as f64);
            (policy.initial_delay_ms as f64 * multiplier) as u64
        }

        RetryStrategy::LinearBackoff => policy
            .initial_delay_ms
            .saturating_mul(retry_index as u64 + 1),
    };

    let capped_delay_ms = base_delay_ms.min(policy.max_delay_ms);

    // Jitter adds up to 25% on top of the capped delay
    let final_delay_ms = if policy.jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        capped_delay_ms.saturating_add(rand::rng().random_range(0..=jitter_range))
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// Decides whether a failure should be retried
///
/// Failures the predicate rejects propagate on first occurrence without
/// consuming retry budget.
///
/// # Example
///
/// ```rust
/// use callwrap_core::retry::RetryPredicate;
/// use std::io::{Error, ErrorKind};
///
/// struct TransientIo;
///
/// impl RetryPredicate<Error> for TransientIo {
///     fn should_retry(&self, error: &Error) -> bool {
///         matches!(error.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted)
///     }
/// }
/// ```
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    /// Determine whether the given error should be retried
    fn should_retry(&self, error: &E) -> bool;
}

/// Every failure is retryable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// No failure is retryable
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl<E: ?Sized> RetryPredicate<E> for NeverRetry {
    fn should_retry(&self, _error: &E) -> bool {
        false
    }
}

/// A predicate backed by a closure
pub struct ClosurePredicate<F> {
    predicate: F,
}

impl<F> ClosurePredicate<F> {
    /// Create a new closure-based predicate
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<E, F> RetryPredicate<E> for ClosurePredicate<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}

/// Retries failures whose message contains one of the given patterns
#[derive(Debug, Clone)]
pub struct MessagePredicate {
    retryable_patterns: Vec<String>,
}

impl MessagePredicate {
    /// Create a new message predicate with the given patterns
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            retryable_patterns: patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        }
    }
}

impl<E: Display + ?Sized> RetryPredicate<E> for MessagePredicate {
    fn should_retry(&self, error: &E) -> bool {
        let error_msg = error.to_string().to_lowercase();
        self.retryable_patterns
            .iter()
            .any(|pattern| error_msg.contains(pattern.as_str()))
    }
}

impl<E: ?Sized, P: RetryPredicate<E> + ?Sized> RetryPredicate<E> for std::sync::Arc<P> {
    fn should_retry(&self, error: &E) -> bool {
        (**self).should_retry(error)
    }
}
