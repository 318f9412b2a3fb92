//! Device-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while resolving or persisting device state.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum DeviceError {
    /// No state row exists for the device (and user, when given)
    #[error("Device not found: {id}")]
    NotFound {
        /// Device identifier
        id: String,
    },

    /// Backend policy refused to create a new device binding
    #[error("The device {id} was disallowed for user {user} per policy settings.")]
    CreationDenied {
        /// Device identifier
        id: String,
        /// Backend username
        user: String,
    },

    /// Backend policy refused an existing device
    #[error("The device {id} was disallowed for user {user} per policy settings.")]
    Denied {
        /// Device identifier
        id: String,
        /// Backend username
        user: String,
    },

    /// Device was marked as blocked by an administrator
    #[error("The device {id} was blocked.")]
    Blocked {
        /// Device identifier
        id: String,
    },

    /// Device store failure
    #[error("Device storage error: {message}")]
    Storage {
        /// Description of the storage failure
        message: String,
    },
}

impl DeviceError {
    /// Check if this error is a policy decision rather than an infrastructure failure.
    pub const fn is_policy_denial(&self) -> bool {
        matches!(self, Self::CreationDenied { .. } | Self::Denied { .. } | Self::Blocked { .. })
    }
}
