//! Named function registry
//!
//! A registry is an ordinary value owned by the application context; there is
//! no process-wide instance. Entries keep their first insertion position even
//! when overwritten, and there is no removal.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::function::Callable;

/// Insertion-ordered mapping from name to callable
pub struct Registry<C: ?Sized> {
    order: Vec<String>,
    entries: HashMap<String, Arc<C>>,
}

impl<C: ?Sized> Default for Registry<C> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }
}

impl<C: ?Sized> Registry<C> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callable` under `name`, returning the same handle
    ///
    /// An existing entry with the same name is replaced in place.
    pub fn register(&mut self, name: impl Into<String>, callable: Arc<C>) -> Arc<C> {
        let name = name.into();
        if self
            .entries
            .insert(name.clone(), Arc::clone(&callable))
            .is_some()
        {
            tracing::debug!(function = %name, "replaced registered function");
        } else {
            tracing::debug!(function = %name, "registered function");
            self.order.push(name);
        }
        callable
    }

    /// Look up a callable by exact name
    pub fn lookup(&self, name: &str) -> Result<Arc<C>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::function_not_found(name))
    }

    /// True when `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Registered entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<C>)> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|c| (name.as_str(), c)))
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<C: ?Sized> Registry<C> {
    /// Register `callable` under its own metadata name
    pub fn register_callable<T, E>(&mut self, callable: Arc<C>) -> Arc<C>
    where
        C: Callable<T, E>,
    {
        let name = callable.metadata().name.clone();
        self.register(name, callable)
    }
}
