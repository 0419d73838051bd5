//! # callwrap-core
//!
//! Call interception for arbitrary callables:
//! - A uniform calling convention (`CallArgs`) and metadata (`FunctionMetadata`)
//! - Interceptors with before/after hooks, bounded retry and call counting
//! - Retry policies, delay strategies, predicates and observers
//! - Timing, memoization and repetition wrappers that stack in explicit order
//! - An insertion-ordered function registry owned by the caller
//! - YAML retry configuration with environment overrides

pub mod config;
pub mod error;
pub mod function;
pub mod intercept;
pub mod registry;
pub mod retry;
pub mod sink;
pub mod wrappers;

pub use config::{CallwrapConfig, ConfigLoader};
pub use error::{Error, Result};
pub use function::{CallArgs, Callable, Function, FunctionMetadata};
pub use intercept::{InterceptStats, Interceptor, InterceptorBuilder};
pub use registry::Registry;
pub use wrappers::CallableExt;
