//! Call interception: hooks, bounded retry and invocation counting
//!
//! ```rust
//! use callwrap_core::intercept::Interceptor;
//! use callwrap_core::retry::TracingObserver;
//! use callwrap_core::{CallArgs, Function};
//!
//! let parse = Function::new("parse", |args: &CallArgs| {
//!     args.positional(0)
//!         .and_then(|v| v.as_str())
//!         .ok_or_else(|| "missing text".to_string())
//!         .and_then(|s| s.parse::<i64>().map_err(|e| e.to_string()))
//! });
//!
//! let wrapped = Interceptor::builder(parse)
//!     .max_retries(2)
//!     .observer(TracingObserver)
//!     .build();
//!
//! assert_eq!(wrapped.invoke(&CallArgs::new().arg("42")), Ok(42));
//! assert_eq!(wrapped.calls(), 1);
//! ```

pub mod hooks;
mod interceptor;

pub use hooks::{AfterHook, BeforeHook};
pub use interceptor::{CallState, InterceptStats, Interceptor, InterceptorBuilder};
