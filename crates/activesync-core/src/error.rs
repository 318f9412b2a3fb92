//! Unified error types for the ActiveSync core.

use activesync_types::{ConfigError, DeviceError, ProtocolError};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Main error type for all core operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Missing or rejected credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Malformed request: missing device id, unknown command, bad version.
    #[error("Invalid request: {0}")]
    Protocol(#[from] ProtocolError),

    /// Policy denial that the negotiated version cannot express as a status code.
    #[error("{0}")]
    Device(#[from] DeviceError),

    /// Device store operation failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Backend driver failure while serving the request.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Whether the error was caused by the client rather than the server.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::Protocol(_) | Self::Device(_))
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for core operations.
pub type AppResult<T> = Result<T, AppError>;
