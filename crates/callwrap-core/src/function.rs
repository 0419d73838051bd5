//! Callables, their metadata and the uniform calling convention
//!
//! Every callable in this crate accepts a [`CallArgs`] (ordered positional
//! values plus ordered keyword values) and reports a [`FunctionMetadata`].
//! Wrappers forward both unchanged, which is what lets them nest.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Identity of a callable, reported unchanged by every wrapper around it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionMetadata {
    /// Function name, also the default registry key
    pub name: String,

    /// Human-readable documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl FunctionMetadata {
    /// Create metadata with a name and no documentation
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
        }
    }

    /// Attach documentation
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// Arguments of a single call: positional values followed by keyword values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
}

impl CallArgs {
    /// Empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument, replacing an earlier value for the same key
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.keyword.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.keyword.push((name, value)),
        }
        self
    }

    /// Positional argument at `index`
    pub fn positional(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Keyword argument by name
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// All positional arguments in call order
    pub fn positionals(&self) -> &[Value] {
        &self.positional
    }

    /// All keyword arguments in insertion order
    pub fn keywords(&self) -> &[(String, Value)] {
        &self.keyword
    }

    /// Number of arguments of both kinds
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    /// True when the call carries no arguments
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Render `a, b, key=value` for hooks and diagnostics
    ///
    /// The rendering is for humans only; memoization keys come from
    /// [`CallArgs::cache_key`].
    pub fn signature(&self) -> String {
        self.positional
            .iter()
            .map(|value| value.to_string())
            .chain(
                self.keyword
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value)),
            )
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Canonical key identifying these arguments
    ///
    /// Keyword order does not affect the key.
    pub fn cache_key(&self) -> String {
        let mut keyword: Vec<_> = self.keyword.iter().collect();
        keyword.sort_by(|a, b| a.0.cmp(&b.0));
        serde_json::json!([self.positional, keyword]).to_string()
    }
}

impl fmt::Display for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Anything that can be invoked with [`CallArgs`]
///
/// Implemented by plain [`Function`]s and by every wrapper in this crate, so
/// wrappers stack freely. The callable's own error type is preserved end to
/// end.
pub trait Callable<T, E>: Send + Sync {
    /// Identity of the callable
    fn metadata(&self) -> &FunctionMetadata;

    /// Invoke the callable
    fn call(&self, args: &CallArgs) -> Result<T, E>;

    /// Shorthand for `metadata().name`
    fn name(&self) -> &str {
        &self.metadata().name
    }
}

type CallFn<T, E> = dyn Fn(&CallArgs) -> Result<T, E> + Send + Sync;

/// A named closure
pub struct Function<T, E> {
    metadata: FunctionMetadata,
    func: Box<CallFn<T, E>>,
}

impl<T, E> Function<T, E> {
    /// Create a function from a name and a closure
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::with_metadata(FunctionMetadata::new(name), func)
    }

    /// Create a function with full metadata
    pub fn with_metadata<F>(metadata: FunctionMetadata, func: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<T, E> + Send + Sync + 'static,
    {
        Self {
            metadata,
            func: Box::new(func),
        }
    }

    /// Attach documentation
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.metadata.doc = Some(doc.into());
        self
    }
}

impl<T, E> fmt::Debug for Function<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl<T, E> Callable<T, E> for Function<T, E> {
    fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }

    fn call(&self, args: &CallArgs) -> Result<T, E> {
        (self.func)(args)
    }
}

impl<T, E, C: Callable<T, E> + ?Sized> Callable<T, E> for Arc<C> {
    fn metadata(&self) -> &FunctionMetadata {
        (**self).metadata()
    }

    fn call(&self, args: &CallArgs) -> Result<T, E> {
        (**self).call(args)
    }
}

impl<T, E, C: Callable<T, E> + ?Sized> Callable<T, E> for Box<C> {
    fn metadata(&self) -> &FunctionMetadata {
        (**self).metadata()
    }

    fn call(&self, args: &CallArgs) -> Result<T, E> {
        (**self).call(args)
    }
}
