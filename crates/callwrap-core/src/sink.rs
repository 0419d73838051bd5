//! Text sinks receiving rendered diagnostic lines
//!
//! Hooks, tracers and timers never print directly; they emit through a
//! [`TextSink`] so the destination (console, `tracing`, a test buffer) is
//! chosen by the caller.

use std::sync::{Arc, Mutex, PoisonError};

/// Destination for rendered diagnostic lines
pub trait TextSink: Send + Sync {
    /// Emit one line
    fn emit(&self, line: &str);
}

/// Writes lines to standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl TextSink for ConsoleSink {
    fn emit(&self, line: &str) {
        println!("{}", line);
    }
}

/// Emits lines as `tracing` info events
#[derive(Debug, Clone)]
pub struct TracingSink {
    target: String,
}

impl TracingSink {
    /// Create a sink tagging events with `target`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new("callwrap")
    }
}

impl TextSink for TracingSink {
    fn emit(&self, line: &str) {
        tracing::info!(sink = %self.target, "{}", line);
    }
}

/// Collects lines in memory
#[derive(Debug, Default)]
pub struct CaptureSink {
    lines: Mutex<Vec<String>>,
}

impl CaptureSink {
    /// Create an empty capture sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured lines
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the captured lines
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl TextSink for CaptureSink {
    fn emit(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

/// Prefixes every line before forwarding it, e.g. `DEBUG: message`
#[derive(Debug, Clone)]
pub struct PrefixSink<S> {
    prefix: String,
    inner: S,
}

impl<S: TextSink> PrefixSink<S> {
    /// Wrap `inner`, prefixing each line with `prefix: `
    pub fn new(prefix: impl Into<String>, inner: S) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

impl<S: TextSink> TextSink for PrefixSink<S> {
    fn emit(&self, line: &str) {
        self.inner.emit(&format!("{}: {}", self.prefix, line));
    }
}

impl<S: TextSink + ?Sized> TextSink for Arc<S> {
    fn emit(&self, line: &str) {
        (**self).emit(line)
    }
}

impl<S: TextSink + ?Sized> TextSink for Box<S> {
    fn emit(&self, line: &str) {
        (**self).emit(line)
    }
}
