//! Backend driver interface.
//!
//! The backend owns accounts and mail data. The core only needs it to
//! authenticate, pick a provisioning mode and, optionally, veto or rewrite
//! devices while they are being resolved.

mod configured;

pub use configured::{hash_password, ConfiguredBackend};

use activesync_types::{Device, GlobalStatus, ProtocolVersion, ProvisioningMode};
use async_trait::async_trait;

use crate::error::AppResult;

/// Result of checking a user's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    /// Wrong password or unknown account
    Rejected,
    /// Valid account that may not sync
    UserDenied,
    /// Valid account, but this device is not allowed for it
    DeviceDenied,
    /// Denied for another policy reason
    Denied,
}

impl AuthOutcome {
    /// Status reported to clients that can carry a global error.
    pub const fn global_status(self) -> Option<GlobalStatus> {
        match self {
            Self::Accepted | Self::Rejected => None,
            Self::UserDenied => Some(GlobalStatus::SyncNotAllowed),
            Self::DeviceDenied => Some(GlobalStatus::DeviceBlockedForUser),
            Self::Denied => Some(GlobalStatus::Denied),
        }
    }
}

/// Answer of the device veto hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceVerdict {
    Allow,
    Deny(GlobalStatus),
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
        domain: Option<&str>,
    ) -> AppResult<AuthOutcome>;

    /// Map a login (possibly an email address) to a backend username.
    fn username_from_email(&self, login: &str) -> String {
        login.to_string()
    }

    async fn provisioning(&self, device: &Device) -> AppResult<ProvisioningMode>;

    /// Per-request protocol ceiling. It can only lower the configured maximum.
    async fn version_callback(
        &self,
        _user: &str,
        _device_id: &str,
    ) -> AppResult<Option<ProtocolVersion>> {
        Ok(None)
    }

    /// Called once for an (id, user) pair the store has never seen.
    async fn create_device_callback(&self, _device: &Device) -> AppResult<DeviceVerdict> {
        Ok(DeviceVerdict::Allow)
    }

    async fn modify_device_callback(&self, device: Device) -> AppResult<Device> {
        Ok(device)
    }

    /// Called on every request after the device has been saved.
    async fn device_callback(&self, _device: &Device) -> AppResult<DeviceVerdict> {
        Ok(DeviceVerdict::Allow)
    }

    fn needs_version_update(&self, device: &mut Device, supported: &str) -> bool {
        device.needs_version_update(supported)
    }
}
