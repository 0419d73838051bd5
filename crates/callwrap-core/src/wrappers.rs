//! Composable wrappers beyond interception: timing, memoization, repetition
//!
//! Each wrapper implements [`Callable`] and reports its inner callable's
//! metadata, so wrappers nest in any order. With [`CallableExt`] the order
//! reads left to right, innermost first:
//!
//! ```rust
//! use callwrap_core::sink::CaptureSink;
//! use callwrap_core::wrappers::CallableExt;
//! use callwrap_core::{CallArgs, Callable, Function};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(CaptureSink::new());
//! let square = Function::new("square", |args: &CallArgs| {
//!     let n = args.positional(0).and_then(|v| v.as_i64()).unwrap_or(0);
//!     Ok::<_, String>(n * n)
//! });
//!
//! // memoize first, then time the memoized function
//! let fast_square = square.memoized().timed(sink.clone());
//! assert_eq!(fast_square.call(&CallArgs::new().arg(3)), Ok(9));
//! assert_eq!(fast_square.name(), "square");
//! assert_eq!(sink.lines().len(), 1);
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::function::{CallArgs, Callable, FunctionMetadata};
use crate::intercept::{Interceptor, InterceptorBuilder};
use crate::sink::TextSink;

/// Reports the elapsed time of every successful call to a sink
///
/// Failed calls are only logged with `tracing`; the sink sees nothing.
pub struct Timed<C, S> {
    inner: C,
    sink: S,
}

impl<C, S> Timed<C, S> {
    /// Time calls to `inner`, reporting to `sink`
    pub fn new(inner: C, sink: S) -> Self {
        Self { inner, sink }
    }

    /// The wrapped callable
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<T, E, C, S> Callable<T, E> for Timed<C, S>
where
    C: Callable<T, E>,
    S: TextSink,
{
    fn metadata(&self) -> &FunctionMetadata {
        self.inner.metadata()
    }

    fn call(&self, args: &CallArgs) -> Result<T, E> {
        let tic = Instant::now();
        let outcome = self.inner.call(args);
        let elapsed = tic.elapsed();

        tracing::debug!(
            function = %self.inner.name(),
            elapsed_ms = elapsed.as_millis() as u64,
            ok = outcome.is_ok(),
            "timed call"
        );
        if outcome.is_ok() {
            self.sink
                .emit(&format!("Elapsed time: {:.2} seconds", elapsed.as_secs_f64()));
        }
        outcome
    }
}

/// Caches successful results per argument list
///
/// Failures are never cached, so a failing call is retried on the next
/// invocation with the same arguments.
pub struct Memoized<C, T> {
    inner: C,
    cache: Mutex<HashMap<String, T>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C, T> Memoized<C, T> {
    /// Memoize `inner`
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The wrapped callable
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Number of cached results
    pub fn cache_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop every cached result
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Calls served from the cache
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }

    /// Calls forwarded to the inner callable
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::SeqCst)
    }
}

impl<T, E, C> Callable<T, E> for Memoized<C, T>
where
    C: Callable<T, E>,
    T: Clone + Send + Sync,
{
    fn metadata(&self) -> &FunctionMetadata {
        self.inner.metadata()
    }

    fn call(&self, args: &CallArgs) -> Result<T, E> {
        let key = args.cache_key();
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(value) = cached {
            self.hits.fetch_add(1, Ordering::SeqCst);
            return Ok(value);
        }

        // The lock is released while the inner callable runs, so recursive
        // callables can re-enter the cache.
        self.misses.fetch_add(1, Ordering::SeqCst);
        let value = self.inner.call(args)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.clone());
        Ok(value)
    }
}

/// Calls the inner callable a fixed number of times and collects the results
pub struct Repeated<C, T> {
    inner: C,
    times: usize,
    _output: PhantomData<fn() -> T>,
}

impl<C, T> Repeated<C, T> {
    /// Call `inner` `times` times per invocation
    pub fn new(inner: C, times: usize) -> Self {
        Self {
            inner,
            times,
            _output: PhantomData,
        }
    }

    /// The wrapped callable
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<T, E, C> Callable<Vec<T>, E> for Repeated<C, T>
where
    C: Callable<T, E>,
{
    fn metadata(&self) -> &FunctionMetadata {
        self.inner.metadata()
    }

    /// Stops at the first failure and returns it
    fn call(&self, args: &CallArgs) -> Result<Vec<T>, E> {
        (0..self.times).map(|_| self.inner.call(args)).collect()
    }
}

/// Wrapper constructors as methods on any callable
pub trait CallableExt<T, E>: Callable<T, E> + Sized {
    /// Report elapsed time of each call to `sink`
    fn timed<S: TextSink>(self, sink: S) -> Timed<Self, S> {
        Timed::new(self, sink)
    }

    /// Cache successful results per argument list
    fn memoized(self) -> Memoized<Self, T>
    where
        T: Clone + Send + Sync,
    {
        Memoized::new(self)
    }

    /// Call `times` times per invocation
    fn repeated(self, times: usize) -> Repeated<Self, T> {
        Repeated::new(self, times)
    }

    /// Start configuring an interceptor
    fn intercept(self) -> InterceptorBuilder<Self> {
        Interceptor::builder(self)
    }

    /// Report `Calling name(signature)` and `name returned value` to `sink`
    fn traced<S>(self, sink: S) -> Interceptor<Self>
    where
        S: TextSink + 'static,
        T: Debug,
    {
        Interceptor::builder(self).trace_to(sink).build()
    }
}

impl<T, E, C: Callable<T, E>> CallableExt<T, E> for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;
    use crate::sink::CaptureSink;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn counted_square() -> (Function<i64, String>, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let f = Function::new("square", move |args: &CallArgs| {
            counter.fetch_add(1, Ordering::SeqCst);
            args.positional(0)
                .and_then(|v| v.as_i64())
                .map(|n| n * n)
                .ok_or_else(|| "expected an integer".to_string())
        });
        (f, count)
    }

    #[test]
    fn test_timed_reports_elapsed() {
        let sink = Arc::new(CaptureSink::new());
        let (square, _) = counted_square();
        let timed = square.timed(sink.clone());

        assert_eq!(timed.call(&CallArgs::new().arg(4)), Ok(16));
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Elapsed time: "));
        assert!(lines[0].ends_with(" seconds"));
        assert_eq!(timed.name(), "square");
    }

    #[test]
    fn test_timed_silent_on_failure() {
        let sink = Arc::new(CaptureSink::new());
        let (square, count) = counted_square();
        let timed = square.timed(sink.clone());

        assert_eq!(
            timed.call(&CallArgs::new().arg("four")),
            Err("expected an integer".to_string())
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_memoized_caches_per_arguments() {
        let (square, count) = counted_square();
        let cached = square.memoized();

        assert_eq!(cached.call(&CallArgs::new().arg(3)), Ok(9));
        assert_eq!(cached.call(&CallArgs::new().arg(3)), Ok(9));
        assert_eq!(cached.call(&CallArgs::new().arg(2)), Ok(4));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(cached.hits(), 1);
        assert_eq!(cached.misses(), 2);
        assert_eq!(cached.cache_len(), 2);

        cached.clear_cache();
        assert_eq!(cached.call(&CallArgs::new().arg(3)), Ok(9));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_memoized_does_not_cache_failures() {
        let (square, count) = counted_square();
        let cached = square.memoized();

        assert!(cached.call(&CallArgs::new().arg("x")).is_err());
        assert!(cached.call(&CallArgs::new().arg("x")).is_err());
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(cached.cache_len(), 0);
    }

    #[test]
    fn test_repeated_collects_results() {
        let (square, count) = counted_square();
        let twice = square.repeated(2);

        assert_eq!(twice.call(&CallArgs::new().arg(5)), Ok(vec![25, 25]));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(twice.name(), "square");
    }

    #[test]
    fn test_repeated_stops_at_first_failure() {
        let (square, count) = counted_square();
        let thrice = square.repeated(3);

        assert!(thrice.call(&CallArgs::new()).is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stacking_order_matters() {
        let (square, count) = counted_square();
        // repeat outside the cache: second call is a hit
        let outer = square.memoized().repeated(2);
        assert_eq!(outer.call(&CallArgs::new().arg(2)), Ok(vec![4, 4]));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let (square, count) = counted_square();
        // cache outside the repeat: both inner calls run once
        let inner = square.repeated(2).memoized();
        assert_eq!(inner.call(&CallArgs::new().arg(2)), Ok(vec![4, 4]));
        assert_eq!(inner.call(&CallArgs::new().arg(2)), Ok(vec![4, 4]));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_traced_reports_call_and_result() {
        let sink = Arc::new(CaptureSink::new());
        let (square, _) = counted_square();
        let traced = square.traced(sink.clone());

        assert_eq!(traced.call(&CallArgs::new().arg(7)), Ok(49));
        assert_eq!(sink.lines(), vec!["Calling square(7)", "square returned 49"]);
    }
}
