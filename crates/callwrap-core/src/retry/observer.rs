//! Retry observation and logging
//!
//! [`RetryObserver`] receives the lifecycle events of an intercepted call.
//! Observers see failures through `Display` only, so the wrapped callable's
//! error type needs no extra bounds beyond that.

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::sink::TextSink;

/// Observer for retry lifecycle events
///
/// Attempt numbers are 1-indexed and count underlying calls within one
/// invocation of the wrapper; retry numbers count retries consumed from the
/// wrapper's budget, which persists across invocations.
pub trait RetryObserver: Send + Sync {
    /// Called before each underlying call
    fn on_attempt_start(&self, function: &str, attempt: u32);

    /// Called when a failed attempt will be retried after `delay`
    fn on_retry(
        &self,
        function: &str,
        retry: u32,
        max_retries: u32,
        error: &dyn Display,
        delay: Duration,
    );

    /// Called when an attempt succeeds
    fn on_success(&self, function: &str, attempt: u32, elapsed: Duration);

    /// Called when the budget is spent; one final unguarded attempt follows
    fn on_exhausted(&self, function: &str, max_retries: u32, error: &dyn Display);

    /// Called when a failure is rejected by the retry predicate
    fn on_non_retryable(&self, function: &str, attempt: u32, error: &dyn Display) {
        let _ = (function, attempt, error);
    }
}

/// Ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _function: &str, _attempt: u32) {}

    fn on_retry(
        &self,
        _function: &str,
        _retry: u32,
        _max_retries: u32,
        _error: &dyn Display,
        _delay: Duration,
    ) {
    }

    fn on_success(&self, _function: &str, _attempt: u32, _elapsed: Duration) {}

    fn on_exhausted(&self, _function: &str, _max_retries: u32, _error: &dyn Display) {}
}

/// Logs retry events with the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG
/// - `on_retry`: WARN
/// - `on_success`: INFO after a retry, DEBUG on the first attempt
/// - `on_exhausted`: ERROR
/// - `on_non_retryable`: WARN
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, function: &str, attempt: u32) {
        tracing::debug!(function = %function, attempt = attempt, "starting attempt");
    }

    fn on_retry(
        &self,
        function: &str,
        retry: u32,
        max_retries: u32,
        error: &dyn Display,
        delay: Duration,
    ) {
        tracing::warn!(
            function = %function,
            retry = retry,
            max_retries = max_retries,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, function: &str, attempt: u32, elapsed: Duration) {
        if attempt > 1 {
            tracing::info!(
                function = %function,
                attempt = attempt,
                total_duration_ms = elapsed.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                function = %function,
                duration_ms = elapsed.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, function: &str, max_retries: u32, error: &dyn Display) {
        tracing::error!(
            function = %function,
            max_retries = max_retries,
            error = %error,
            "retry budget exhausted, making final attempt"
        );
    }

    fn on_non_retryable(&self, function: &str, attempt: u32, error: &dyn Display) {
        tracing::warn!(
            function = %function,
            attempt = attempt,
            error = %error,
            "non-retryable failure"
        );
    }
}

/// Reports retries as human-readable lines on a [`TextSink`]
///
/// Silent retries are the default; attach this observer to see
/// `Retrying name (error)` lines.
#[derive(Debug, Clone)]
pub struct SinkObserver<S> {
    sink: S,
}

impl<S: TextSink> SinkObserver<S> {
    /// Report to `sink`
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S: TextSink> RetryObserver for SinkObserver<S> {
    fn on_attempt_start(&self, _function: &str, _attempt: u32) {}

    fn on_retry(
        &self,
        function: &str,
        retry: u32,
        max_retries: u32,
        error: &dyn Display,
        _delay: Duration,
    ) {
        self.sink.emit(&format!(
            "{}/{}: Retrying {} ({})",
            retry, max_retries, function, error
        ));
    }

    fn on_success(&self, _function: &str, _attempt: u32, _elapsed: Duration) {}

    fn on_exhausted(&self, _function: &str, max_retries: u32, _error: &dyn Display) {
        self.sink.emit(&format!("{} retries done", max_retries));
    }

    fn on_non_retryable(&self, function: &str, _attempt: u32, error: &dyn Display) {
        self.sink
            .emit(&format!("Not retrying {} ({})", function, error));
    }
}

/// Counts retry events
///
/// Useful for testing and metrics collection.
#[derive(Debug, Default)]
pub struct StatsObserver {
    attempt_starts: AtomicU32,
    retries: AtomicU32,
    successes: AtomicU32,
    exhaustions: AtomicU32,
    non_retryable: AtomicU32,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempt starts
    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    /// Number of retries scheduled
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    /// Number of successes
    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Number of exhaustions
    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    /// Number of non-retryable failures
    pub fn non_retryable(&self) -> u32 {
        self.non_retryable.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _function: &str, _attempt: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retry(
        &self,
        _function: &str,
        _retry: u32,
        _max_retries: u32,
        _error: &dyn Display,
        _delay: Duration,
    ) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _function: &str, _attempt: u32, _elapsed: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _function: &str, _max_retries: u32, _error: &dyn Display) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_non_retryable(&self, _function: &str, _attempt: u32, _error: &dyn Display) {
        self.non_retryable.fetch_add(1, Ordering::SeqCst);
    }
}

/// Implement RetryObserver for Arc<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, function: &str, attempt: u32) {
        (**self).on_attempt_start(function, attempt)
    }

    fn on_retry(
        &self,
        function: &str,
        retry: u32,
        max_retries: u32,
        error: &dyn Display,
        delay: Duration,
    ) {
        (**self).on_retry(function, retry, max_retries, error, delay)
    }

    fn on_success(&self, function: &str, attempt: u32, elapsed: Duration) {
        (**self).on_success(function, attempt, elapsed)
    }

    fn on_exhausted(&self, function: &str, max_retries: u32, error: &dyn Display) {
        (**self).on_exhausted(function, max_retries, error)
    }

    fn on_non_retryable(&self, function: &str, attempt: u32, error: &dyn Display) {
        (**self).on_non_retryable(function, attempt, error)
    }
}

/// Pair of observers notified in order
#[derive(Debug, Clone, Default)]
pub struct Both<A, B>(pub A, pub B);

impl<A: RetryObserver, B: RetryObserver> RetryObserver for Both<A, B> {
    fn on_attempt_start(&self, function: &str, attempt: u32) {
        self.0.on_attempt_start(function, attempt);
        self.1.on_attempt_start(function, attempt);
    }

    fn on_retry(
        &self,
        function: &str,
        retry: u32,
        max_retries: u32,
        error: &dyn Display,
        delay: Duration,
    ) {
        self.0.on_retry(function, retry, max_retries, error, delay);
        self.1.on_retry(function, retry, max_retries, error, delay);
    }

    fn on_success(&self, function: &str, attempt: u32, elapsed: Duration) {
        self.0.on_success(function, attempt, elapsed);
        self.1.on_success(function, attempt, elapsed);
    }

    fn on_exhausted(&self, function: &str, max_retries: u32, error: &dyn Display) {
        self.0.on_exhausted(function, max_retries, error);
        self.1.on_exhausted(function, max_retries, error);
    }

    fn on_non_retryable(&self, function: &str, attempt: u32, error: &dyn Display) {
        self.0.on_non_retryable(function, attempt, error);
        self.1.on_non_retryable(function, attempt, error);
    }
}
