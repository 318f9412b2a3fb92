//! Provisioning modes and global status codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How strictly policy provisioning is enforced for a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningMode {
    /// Every data command requires a matching policy key
    Enforced,
    /// Clients that never present a policy key are let through
    Loose,
    /// No provisioning at all
    #[default]
    #[serde(rename = "none")]
    Disabled,
}

impl fmt::Display for ProvisioningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Enforced => write!(f, "enforced"),
            Self::Loose => write!(f, "loose"),
            Self::Disabled => write!(f, "none"),
        }
    }
}

/// Sticky per-request status set before command dispatch.
///
/// Command handlers of protocol versions above the graceful cutoff surface it
/// inside the normal response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlobalStatus {
    /// The user is not allowed to sync
    SyncNotAllowed,
    /// The device is blocked for this user
    DeviceBlockedForUser,
    /// Access denied for another policy reason
    Denied,
    /// Backend-specific status code
    Other(u16),
}

impl GlobalStatus {
    /// EAS status code carried in response bodies.
    pub const fn code(self) -> u16 {
        match self {
            Self::SyncNotAllowed => 126,
            Self::DeviceBlockedForUser => 129,
            Self::Denied => 130,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for GlobalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
