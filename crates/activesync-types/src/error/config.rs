//! Configuration errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating the server configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// Configuration file could not be read or written
    #[error("Config file error ({path}): {message}")]
    File {
        /// Path of the configuration file
        path: String,
        /// Underlying failure
        message: String,
    },

    /// Configuration file is not valid JSON for `ServerConfig`
    #[error("Config parse error: {message}")]
    Parse {
        /// Parser message
        message: String,
    },

    /// A value is present but unusable
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Name of the offending field
        field: String,
        /// Why the value was rejected
        message: String,
    },
}
