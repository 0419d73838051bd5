//! Retry configuration loading
//!
//! Loads per-function retry policies from YAML with the following precedence
//! (low to high):
//! 1. Built-in defaults (no retry)
//! 2. Configuration file
//! 3. Environment variables (CALLWRAP_* prefix), applied to the default policy

use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, RetryStrategy};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;

/// Policy used when neither a function entry nor a `default:` is configured
static NO_RETRY: RetryPolicy = RetryPolicy {
    max_retries: 0,
    strategy: RetryStrategy::FixedDelay,
    backoff_multiplier: 2.0,
    initial_delay_ms: 0,
    max_delay_ms: 30000,
    jitter: false,
};

/// Retry policies keyed by function name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CallwrapConfig {
    /// Policy for functions without their own entry; `None` means no retry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<RetryPolicy>,

    /// Per-function policies
    #[serde(default)]
    pub functions: HashMap<String, RetryPolicy>,
}

impl CallwrapConfig {
    /// Policy for functions without their own entry
    pub fn default_policy(&self) -> &RetryPolicy {
        self.default.as_ref().unwrap_or(&NO_RETRY)
    }

    /// Policy for `function`, falling back to the default
    pub fn policy_for(&self, function: &str) -> &RetryPolicy {
        self.functions
            .get(function)
            .unwrap_or_else(|| self.default_policy())
    }

    /// Validate every policy
    pub fn validate(&self) -> Result<()> {
        self.default_policy().validate()?;
        for (name, policy) in &self.functions {
            policy
                .validate()
                .map_err(|e| Error::invalid_config(format!("function {}: {}", name, e)))?;
        }
        Ok(())
    }

    /// Overlay another config on top of this one
    ///
    /// Function entries in `overlay` replace those of the same name; the
    /// default is replaced only when `overlay` sets one.
    pub fn merge(mut self, overlay: CallwrapConfig) -> Self {
        for (name, policy) in overlay.functions {
            self.functions.insert(name, policy);
        }
        if overlay.default.is_some() {
            self.default = overlay.default;
        }
        self
    }

    fn default_mut(&mut self) -> &mut RetryPolicy {
        self.default.get_or_insert_with(RetryPolicy::default)
    }
}

/// Loads [`CallwrapConfig`] from files and the environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a config file and apply environment overrides
    pub fn load(path: &Utf8Path) -> Result<CallwrapConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        let config = Self::parse(&content)?;
        let config = Self::apply_env_overrides(config)?;
        config.validate()?;

        tracing::debug!(
            path = %path,
            functions = config.functions.len(),
            "loaded retry configuration"
        );
        Ok(config)
    }

    /// Built-in defaults with environment overrides
    pub fn from_env() -> Result<CallwrapConfig> {
        let config = Self::apply_env_overrides(CallwrapConfig::default())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML content without touching the environment
    pub fn parse(content: &str) -> Result<CallwrapConfig> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    fn apply_env_overrides(mut config: CallwrapConfig) -> Result<CallwrapConfig> {
        if let Ok(val) = env::var("CALLWRAP_MAX_RETRIES") {
            config.default_mut().max_retries = val.parse().map_err(|_| {
                Error::invalid_config("CALLWRAP_MAX_RETRIES must be a non-negative integer")
            })?;
        }

        if let Ok(val) = env::var("CALLWRAP_RETRY_DELAY_MS") {
            let default = config.default_mut();
            default.initial_delay_ms = val.parse().map_err(|_| {
                Error::invalid_config("CALLWRAP_RETRY_DELAY_MS must be a valid number")
            })?;
            default.max_delay_ms = default.max_delay_ms.max(default.initial_delay_ms);
        }

        if let Ok(val) = env::var("CALLWRAP_JITTER") {
            config.default_mut().jitter = val
                .parse()
                .map_err(|_| Error::invalid_config("CALLWRAP_JITTER must be true or false"))?;
        }

        Ok(config)
    }
}
