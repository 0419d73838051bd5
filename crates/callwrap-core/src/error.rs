//! Error types for callwrap-core
//!
//! Wrapped callables keep their own error type; these errors cover the
//! registry and configuration surfaces only.

use thiserror::Error;

/// Result type alias using callwrap-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for callwrap
#[derive(Error, Debug)]
pub enum Error {
    /// No callable registered under the requested name
    #[error("Function not registered: {name}")]
    FunctionNotFound { name: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a function not found error
    pub fn function_not_found(name: impl Into<String>) -> Self {
        Self::FunctionNotFound { name: name.into() }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Check if this error is a registry miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::FunctionNotFound { .. })
    }
}
