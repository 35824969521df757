//! Error types for cow-core
//!
//! Centralized error handling using `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Main error type for cow-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Dial target is not a well-formed `host:port` pair
    #[error("address {address}: {reason}")]
    AddressFormat {
        /// The address as passed to dial
        address: String,
        /// Why it could not be split
        reason: &'static str,
    },

    /// Error returned by the chosen dialer, unchanged
    #[error(transparent)]
    Dial(std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path to the missing config file
        path: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    ConfigValue {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an address format error
    pub fn address_format(address: impl Into<String>, reason: &'static str) -> Self {
        Self::AddressFormat {
            address: address.into(),
            reason,
        }
    }

    /// Create a config value error
    pub fn config_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.into(),
            message: message.into(),
        }
    }
}
