//! The call interceptor
//!
//! An [`Interceptor`] owns a callable plus the state the retry loop needs:
//! an invocation counter, an attempt counter and a retries-used counter that
//! persists across invocations until [`Interceptor::reset_retries`].

use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::function::{CallArgs, Callable, FunctionMetadata};
use crate::retry::{
    calculate_delay, delay_millis, AlwaysRetry, NoOpObserver, RetryObserver, RetryPolicy, RetryPredicate,
    RetryStrategy,
};
use crate::sink::TextSink;

use super::hooks::{self, AfterHook, BeforeHook};

/// Lifecycle state of a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Invocation accepted, no attempt made yet
    Ready,
    /// A guarded attempt is running
    Attempting,
    /// Waiting before the next guarded attempt
    RetryWait,
    /// Budget spent; the final unguarded attempt is running
    ExhaustedAttempt,
    /// Terminal: a value was returned
    Success,
    /// Terminal: an error was propagated
    Failure,
}

impl CallState {
    /// True for `Success` and `Failure`
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Success | CallState::Failure)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Ready => "ready",
            CallState::Attempting => "attempting",
            CallState::RetryWait => "retry-wait",
            CallState::ExhaustedAttempt => "exhausted-attempt",
            CallState::Success => "success",
            CallState::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// Snapshot of an interceptor's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptStats {
    /// Invocations of the wrapper
    pub calls: u64,
    /// Underlying calls made to the wrapped callable
    pub attempts: u64,
    /// Retries consumed from the budget
    pub retries_used: u32,
    /// The retry budget
    pub max_retries: u32,
}

impl InterceptStats {
    /// Retries still available
    pub fn remaining_retries(&self) -> u32 {
        self.max_retries.saturating_sub(self.retries_used)
    }
}

/// Builder for an [`Interceptor`]
///
/// # Example
///
/// ```rust
/// use callwrap_core::{CallArgs, Function, Interceptor};
/// use std::time::Duration;
///
/// let roll = Function::new("roll", |_: &CallArgs| Ok::<_, String>(6));
/// let wrapped = Interceptor::builder(roll)
///     .max_retries(3)
///     .retry_delay(Duration::from_millis(10))
///     .build();
///
/// assert_eq!(wrapped.invoke(&CallArgs::new()), Ok(6));
/// ```
pub struct InterceptorBuilder<C, P = AlwaysRetry, O = NoOpObserver> {
    inner: C,
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
    policy: RetryPolicy,
    predicate: P,
    observer: O,
}

impl<C> InterceptorBuilder<C, AlwaysRetry, NoOpObserver> {
    fn new(inner: C) -> Self {
        Self {
            inner,
            before: None,
            after: None,
            policy: RetryPolicy::default(),
            predicate: AlwaysRetry,
            observer: NoOpObserver,
        }
    }
}

impl<C, P, O> InterceptorBuilder<C, P, O> {
    /// Run `hook` with the rendered signature before each call
    pub fn before_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.before = Some(std::sync::Arc::new(hook));
        self
    }

    /// Run `hook` with the signature and result after each successful call
    pub fn after_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &dyn Debug) + Send + Sync + 'static,
    {
        self.after = Some(std::sync::Arc::new(hook));
        self
    }

    /// Install a before/after hook pair
    pub fn hooks(mut self, (before, after): (BeforeHook, AfterHook)) -> Self {
        self.before = Some(before);
        self.after = Some(after);
        self
    }

    /// Set the retry budget
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Wait a fixed `delay` between attempts
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        let delay_ms = delay_millis(delay);
        self.policy.strategy = RetryStrategy::FixedDelay;
        self.policy.initial_delay_ms = delay_ms;
        self.policy.max_delay_ms = self.policy.max_delay_ms.max(delay_ms);
        self
    }

    /// Replace the whole retry policy, budget included
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the predicate deciding which failures are retried
    pub fn retry_if<P2>(self, predicate: P2) -> InterceptorBuilder<C, P2, O> {
        InterceptorBuilder {
            inner: self.inner,
            before: self.before,
            after: self.after,
            policy: self.policy,
            predicate,
            observer: self.observer,
        }
    }

    /// Set the observer receiving retry events
    pub fn observer<O2>(self, observer: O2) -> InterceptorBuilder<C, P, O2> {
        InterceptorBuilder {
            inner: self.inner,
            before: self.before,
            after: self.after,
            policy: self.policy,
            predicate: self.predicate,
            observer,
        }
    }

    /// Build the interceptor, copying the wrapped callable's metadata
    pub fn build<T, E>(self) -> Interceptor<C, P, O>
    where
        C: Callable<T, E>,
    {
        Interceptor {
            metadata: self.inner.metadata().clone(),
            inner: self.inner,
            before: self.before,
            after: self.after,
            policy: self.policy,
            predicate: self.predicate,
            observer: self.observer,
            calls: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            retries_used: AtomicU32::new(0),
        }
    }
}

impl<C, P, O> InterceptorBuilder<C, P, O> {
    /// Report `Calling name(signature)` / `name returned value` to `sink`
    pub fn trace_to<T, E, S>(self, sink: S) -> Self
    where
        C: Callable<T, E>,
        S: TextSink + 'static,
    {
        let pair = hooks::trace(self.inner.metadata().name.clone(), sink);
        self.hooks(pair)
    }
}

/// A callable wrapped with hooks, bounded retry and call counting
///
/// The counters are atomics so an interceptor can be shared, but the budget
/// check and the retry increment are separate steps: concurrent callers can
/// jointly overrun `max_retries`. Serialize calls externally when the budget
/// must hold exactly.
pub struct Interceptor<C, P = AlwaysRetry, O = NoOpObserver> {
    metadata: FunctionMetadata,
    inner: C,
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    calls: AtomicU64,
    attempts: AtomicU64,
    retries_used: AtomicU32,
}

impl<C> Interceptor<C> {
    /// Start configuring an interceptor around `inner`
    pub fn builder(inner: C) -> InterceptorBuilder<C> {
        InterceptorBuilder::new(inner)
    }
}

impl<C, P, O> Interceptor<C, P, O> {
    /// The wrapped callable
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// The retry policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invocations of the wrapper so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Retries consumed from the budget so far
    pub fn retries_used(&self) -> u32 {
        self.retries_used.load(Ordering::SeqCst)
    }

    /// Snapshot of all counters
    pub fn stats(&self) -> InterceptStats {
        InterceptStats {
            calls: self.calls(),
            attempts: self.attempts.load(Ordering::SeqCst),
            retries_used: self.retries_used(),
            max_retries: self.policy.max_retries,
        }
    }

    /// Re-arm the retry budget
    pub fn reset_retries(&self) {
        let used = self.retries_used.swap(0, Ordering::SeqCst);
        tracing::debug!(function = %self.metadata.name, retries_used = used, "retry budget reset");
    }

    fn enter(&self, state: CallState, attempt: u32) {
        tracing::debug!(function = %self.metadata.name, state = %state, attempt = attempt, "call state");
    }
}

impl<C, P, O> Interceptor<C, P, O>
where
    O: RetryObserver,
{
    /// Invoke the wrapped callable with hooks and retry
    ///
    /// Failures are returned exactly as the wrapped callable produced them.
    pub fn invoke<T, E>(&self, args: &CallArgs) -> Result<T, E>
    where
        C: Callable<T, E>,
        P: RetryPredicate<E>,
        T: Debug,
        E: Display,
    {
        let name = self.metadata.name.as_str();
        let signature = args.signature();
        let start = Instant::now();
        let max_retries = self.policy.max_retries;
        let mut attempt = 0;

        self.enter(CallState::Ready, attempt);
        if let Some(before) = &self.before {
            before(&signature);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        // No budget left: a single unguarded attempt, as if unwrapped
        if self.retries_used() >= max_retries {
            self.enter(CallState::ExhaustedAttempt, attempt + 1);
            let outcome = self.attempt(args, &mut attempt);
            return self.finish(&signature, outcome, attempt, start);
        }

        loop {
            self.enter(CallState::Attempting, attempt + 1);
            match self.attempt(args, &mut attempt) {
                Ok(value) => return self.finish(&signature, Ok(value), attempt, start),
                Err(err) => {
                    if !self.predicate.should_retry(&err) {
                        self.observer.on_non_retryable(name, attempt, &err);
                        self.enter(CallState::Failure, attempt);
                        return Err(err);
                    }

                    if self.retries_used() >= max_retries {
                        self.observer.on_exhausted(name, max_retries, &err);
                        break;
                    }

                    let retry = self.retries_used.fetch_add(1, Ordering::SeqCst) + 1;
                    let delay = calculate_delay(&self.policy, retry);
                    self.observer
                        .on_retry(name, retry, max_retries, &err, delay);

                    self.enter(CallState::RetryWait, attempt);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        self.enter(CallState::ExhaustedAttempt, attempt + 1);
        let outcome = self.attempt(args, &mut attempt);
        self.finish(&signature, outcome, attempt, start)
    }

    fn attempt<T, E>(&self, args: &CallArgs, attempt: &mut u32) -> Result<T, E>
    where
        C: Callable<T, E>,
    {
        *attempt += 1;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.observer.on_attempt_start(&self.metadata.name, *attempt);
        self.inner.call(args)
    }

    fn finish<T: Debug, E>(
        &self,
        signature: &str,
        outcome: Result<T, E>,
        attempt: u32,
        start: Instant,
    ) -> Result<T, E> {
        match &outcome {
            Ok(value) => {
                self.observer
                    .on_success(&self.metadata.name, attempt, start.elapsed());
                if let Some(after) = &self.after {
                    after(signature, value);
                }
                self.enter(CallState::Success, attempt);
            }
            Err(_) => self.enter(CallState::Failure, attempt),
        }
        outcome
    }
}

impl<T, E, C, P, O> Callable<T, E> for Interceptor<C, P, O>
where
    C: Callable<T, E>,
    P: RetryPredicate<E>,
    O: RetryObserver,
    T: Debug,
    E: Display,
{
    fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }

    fn call(&self, args: &CallArgs) -> Result<T, E> {
        self.invoke(args)
    }
}

impl<C, P, O> fmt::Debug for Interceptor<C, P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("metadata", &self.metadata)
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;
    use crate::retry::{ClosurePredicate, StatsObserver};
    use crate::sink::CaptureSink;
    use std::sync::{Arc, Mutex};

    /// Fails with its attempt number until `succeed_on`, then returns it
    fn flaky(succeed_on: u32) -> (Function<u32, String>, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let f = Function::new("flaky", move |_: &CallArgs| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= succeed_on {
                Ok(n)
            } else {
                Err(format!("attempt {} failed", n))
            }
        });
        (f, count)
    }

    /// Records the delay announced before each retry
    struct DelayRecorder(Arc<Mutex<Vec<Duration>>>);

    impl RetryObserver for DelayRecorder {
        fn on_attempt_start(&self, _function: &str, _attempt: u32) {}

        fn on_retry(
            &self,
            _function: &str,
            _retry: u32,
            _max_retries: u32,
            _error: &dyn Display,
            delay: Duration,
        ) {
            self.0.lock().unwrap().push(delay);
        }

        fn on_success(&self, _function: &str, _attempt: u32, _elapsed: Duration) {}

        fn on_exhausted(&self, _function: &str, _max_retries: u32, _error: &dyn Display) {}
    }

    #[test]
    fn test_counting_stub_returns_42() {
        let stub = Function::new("answer", |_: &CallArgs| Ok::<_, String>(42));
        let wrapped = Interceptor::builder(stub).build();

        assert_eq!(wrapped.invoke(&CallArgs::new()), Ok(42));
        assert_eq!(wrapped.calls(), 1);
        assert_eq!(wrapped.invoke(&CallArgs::new()), Ok(42));
        assert_eq!(wrapped.calls(), 2);
    }

    #[test]
    fn test_metadata_is_transparent() {
        let f = Function::new("greet", |_: &CallArgs| Ok::<_, String>(()))
            .with_doc("Say hello");
        let expected = f.metadata().clone();
        let wrapped = Interceptor::builder(f).max_retries(2).build();

        assert_eq!(Callable::<(), String>::metadata(&wrapped), &expected);
        assert_eq!(wrapped.inner().name(), "greet");
    }

    #[test]
    fn test_hooks_see_signature_and_result() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (before_log, after_log) = (seen.clone(), seen.clone());
        let adder = Function::new("adder", |args: &CallArgs| {
            let a = args.positional(0).and_then(|v| v.as_i64()).unwrap_or(0);
            let b = args.keyword("b").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok::<_, String>(a + b)
        });

        let wrapped = Interceptor::builder(adder)
            .before_hook(move |sig| before_log.lock().unwrap().push(format!("before {}", sig)))
            .after_hook(move |sig, value| {
                after_log
                    .lock()
                    .unwrap()
                    .push(format!("after {} -> {:?}", sig, value))
            })
            .build();

        assert_eq!(wrapped.invoke(&CallArgs::new().arg(23).kwarg("b", 10)), Ok(33));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["before 23, b=10", "after 23, b=10 -> 33"]
        );
    }

    #[test]
    fn test_after_hook_skipped_on_failure() {
        let after_calls = Arc::new(AtomicU32::new(0));
        let counter = after_calls.clone();
        let failing = Function::new("failing", |_: &CallArgs| Err::<u32, _>("nope".to_string()));

        let wrapped = Interceptor::builder(failing)
            .after_hook(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        assert_eq!(wrapped.invoke(&CallArgs::new()), Err("nope".to_string()));
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_retries_is_single_attempt() {
        let (f, count) = flaky(u32::MAX);
        let wrapped = Interceptor::builder(f).build();

        assert_eq!(
            wrapped.invoke(&CallArgs::new()),
            Err("attempt 1 failed".to_string())
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(wrapped.retries_used(), 0);
    }

    #[test]
    fn test_always_failing_makes_k_plus_two_calls() {
        let (f, count) = flaky(u32::MAX);
        let observer = Arc::new(StatsObserver::new());
        let wrapped = Interceptor::builder(f)
            .max_retries(3)
            .observer(observer.clone())
            .build();

        let err = wrapped.invoke(&CallArgs::new()).unwrap_err();

        // Error comes from the final unguarded attempt, untouched
        assert_eq!(err, "attempt 5 failed");
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(wrapped.retries_used(), 3);
        assert_eq!(observer.retries(), 3);
        assert_eq!(observer.exhaustions(), 1);
        assert_eq!(wrapped.stats().attempts, 5);
    }

    #[test]
    fn test_eventual_success_within_budget() {
        let (f, count) = flaky(3);
        let wrapped = Interceptor::builder(f).max_retries(2).build();

        assert_eq!(wrapped.invoke(&CallArgs::new()), Ok(3));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(wrapped.retries_used(), 2);
    }

    #[test]
    fn test_final_attempt_can_succeed() {
        // 1 initial + 2 retries fail, the unguarded fourth call succeeds
        let (f, _) = flaky(4);
        let wrapped = Interceptor::builder(f).max_retries(2).build();

        assert_eq!(wrapped.invoke(&CallArgs::new()), Ok(4));
    }

    #[test]
    fn test_non_retryable_short_circuits() {
        let (f, count) = flaky(u32::MAX);
        let observer = Arc::new(StatsObserver::new());
        let wrapped = Interceptor::builder(f)
            .max_retries(5)
            .retry_if(ClosurePredicate::new(|err: &String| !err.contains("attempt 1")))
            .observer(observer.clone())
            .build();

        assert_eq!(
            wrapped.invoke(&CallArgs::new()),
            Err("attempt 1 failed".to_string())
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(wrapped.retries_used(), 0);
        assert_eq!(observer.non_retryable(), 1);
    }

    #[test]
    fn test_budget_persists_across_calls() {
        let (f, count) = flaky(u32::MAX);
        let wrapped = Interceptor::builder(f).max_retries(2).build();

        assert!(wrapped.invoke(&CallArgs::new()).is_err());
        assert_eq!(count.load(Ordering::SeqCst), 4);

        // Budget spent: the next call is a single unguarded attempt
        assert!(wrapped.invoke(&CallArgs::new()).is_err());
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(wrapped.stats().remaining_retries(), 0);

        wrapped.reset_retries();
        assert_eq!(wrapped.retries_used(), 0);
        assert!(wrapped.invoke(&CallArgs::new()).is_err());
        assert_eq!(count.load(Ordering::SeqCst), 9);
        assert_eq!(wrapped.calls(), 3);
    }

    #[test]
    fn test_retry_delay_is_applied() {
        let (f, _) = flaky(2);
        let wrapped = Interceptor::builder(f)
            .max_retries(1)
            .retry_delay(Duration::from_millis(20))
            .build();

        let start = Instant::now();
        assert_eq!(wrapped.invoke(&CallArgs::new()), Ok(2));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sub_millisecond_delay_still_waits() {
        let (f, _) = flaky(2);
        let wrapped = Interceptor::builder(f)
            .max_retries(1)
            .retry_delay(Duration::from_micros(900))
            .build();
        assert_eq!(wrapped.policy().initial_delay_ms, 1);

        let start = Instant::now();
        assert_eq!(wrapped.invoke(&CallArgs::new()), Ok(2));
        assert!(start.elapsed() >= Duration::from_micros(900));
    }

    #[test]
    fn test_huge_retry_delay_saturates() {
        let (f, _) = flaky(1);
        let wrapped = Interceptor::builder(f)
            .retry_delay(Duration::from_secs(u64::MAX / 100))
            .build();
        assert_eq!(wrapped.policy().initial_delay_ms, u64::MAX);
        assert_eq!(wrapped.policy().max_delay_ms, u64::MAX);
    }

    #[test]
    fn test_no_delay_before_final_attempt() {
        let delays = Arc::new(Mutex::new(Vec::new()));
        let recorded = delays.clone();
        let (f, count) = flaky(u32::MAX);
        let wrapped = Interceptor::builder(f)
            .max_retries(3)
            .retry_delay(Duration::from_millis(50))
            .observer(DelayRecorder(recorded))
            .build();

        let start = Instant::now();
        assert!(wrapped.invoke(&CallArgs::new()).is_err());
        let elapsed = start.elapsed();

        // 3 guarded retries wait, the final unguarded attempt does not
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(*delays.lock().unwrap(), vec![Duration::from_millis(50); 3]);
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_millis(200));
    }

    #[test]
    fn test_trace_to_sink() {
        let sink = Arc::new(CaptureSink::new());
        let greet = Function::new("greet", |args: &CallArgs| {
            let name = args.positional(0).and_then(|v| v.as_str()).unwrap_or("");
            Ok::<_, String>(format!("Hello {}", name))
        });
        let wrapped = Interceptor::builder(greet).trace_to(sink.clone()).build();

        wrapped.invoke(&CallArgs::new().arg("PyCon")).unwrap();
        assert_eq!(
            sink.lines(),
            vec![
                r#"Calling greet("PyCon")"#,
                r#"greet returned "Hello PyCon""#,
            ]
        );
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_state_transitions_logged_at_debug() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let (f, _) = flaky(2);
        let wrapped = Interceptor::builder(f).max_retries(1).build();
        tracing::subscriber::with_default(subscriber, || {
            assert_eq!(wrapped.invoke(&CallArgs::new()), Ok(2));
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let states: Vec<&str> = output.lines().filter(|l| l.contains("call state")).collect();
        assert!(states.iter().all(|l| l.contains("DEBUG")));
        assert!(states.iter().any(|l| l.contains("state=retry-wait")));
        assert!(states.iter().any(|l| l.contains("state=success")));
    }

    #[test]
    fn test_call_state_terminal() {
        assert!(CallState::Success.is_terminal());
        assert!(CallState::Failure.is_terminal());
        assert!(!CallState::RetryWait.is_terminal());
        assert_eq!(CallState::ExhaustedAttempt.to_string(), "exhausted-attempt");
    }
}
