//! Shared fixtures for callwrap-core integration tests

#![allow(dead_code)]

use callwrap_core::{CallArgs, Function};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};
use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install a test-writer subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(tracing_fmt::layer().with_test_writer().with_target(false))
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .try_init();
    });
}

/// Failure raised by the roll fixtures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollError {
    /// The roll was too low; worth retrying
    TooLow(u32),
    /// The input could not be used at all
    BadInput(String),
}

impl fmt::Display for RollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollError::TooLow(n) => write!(f, "{}", n),
            RollError::BadInput(msg) => write!(f, "bad input: {}", msg),
        }
    }
}

/// Deterministic stand-in for a die that only accepts high rolls:
/// yields `rolls` in order, failing with `TooLow` below 5
pub fn only_roll_highs(rolls: Vec<u32>) -> (Function<u32, RollError>, Arc<AtomicU32>) {
    let count = Arc::new(AtomicU32::new(0));
    let counter = count.clone();
    let f = Function::new("only_roll_highs", move |_: &CallArgs| {
        let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
        let roll = rolls.get(n).copied().unwrap_or(6);
        if roll < 5 {
            Err(RollError::TooLow(roll))
        } else {
            Ok(roll)
        }
    })
    .with_doc("Roll a die, rejecting anything below 5");
    (f, count)
}

/// Parses its first positional argument as an age
pub fn get_age() -> Function<u32, RollError> {
    Function::new("get_age", |args: &CallArgs| {
        let text = args
            .positional(0)
            .and_then(|v| v.as_str())
            .ok_or_else(|| RollError::BadInput("missing text".to_string()))?;
        text.trim()
            .parse()
            .map_err(|_| RollError::BadInput(text.to_string()))
    })
}
