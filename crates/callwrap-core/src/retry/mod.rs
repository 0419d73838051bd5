//! Retry policies, delay strategies, predicates and observers
//!
//! The retry loop itself lives in [`crate::intercept`]; this module holds the
//! pieces it is configured with.
//!
//! # Features
//!
//! - Delay strategies: None, Fixed, Exponential, Linear backoff
//! - Optional jitter of up to 25%
//! - Predicates separating retryable from fatal failures
//! - Observable retry attempts via the `RetryObserver` trait

mod observer;
mod policy;
mod strategies;

pub use observer::{
    Both, NoOpObserver, RetryObserver, SinkObserver, StatsObserver, TracingObserver,
};
pub use policy::{RetryPolicy, RetryStrategy};
pub(crate) use policy::delay_millis;
pub use strategies::{
    calculate_delay, AlwaysRetry, ClosurePredicate, MessagePredicate, NeverRetry, RetryPredicate,
};
