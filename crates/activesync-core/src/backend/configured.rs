//! Backend driven entirely by [`ServerConfig`].

use std::sync::Arc;

use activesync_types::{Device, GlobalStatus, ProtocolVersion, ProvisioningMode, ServerConfig};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{AuthOutcome, Backend, DeviceVerdict};
use crate::error::AppResult;

/// Lowercase hex SHA-256, the format stored in `users[].password_sha256`.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Accounts, denials and provisioning taken from the configuration file.
#[derive(Debug, Clone)]
pub struct ConfiguredBackend {
    config: Arc<ServerConfig>,
}

impl ConfiguredBackend {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    fn is_device_denied(&self, id: &str) -> bool {
        self.config.denied_devices.iter().any(|d| d.eq_ignore_ascii_case(id))
    }
}

#[async_trait]
impl Backend for ConfiguredBackend {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
        _domain: Option<&str>,
    ) -> AppResult<AuthOutcome> {
        let Some(entry) = self.config.user(username) else {
            tracing::debug!("Unknown user {}", username);
            return Ok(AuthOutcome::Rejected);
        };

        let expected = entry.password_sha256.to_ascii_lowercase();
        if !constant_time_compare(&hash_password(password), &expected) {
            return Ok(AuthOutcome::Rejected);
        }

        if self.config.denied_users.iter().any(|u| u.eq_ignore_ascii_case(username)) {
            return Ok(AuthOutcome::UserDenied);
        }
        Ok(AuthOutcome::Accepted)
    }

    fn username_from_email(&self, login: &str) -> String {
        if let Some(domain) = self.config.email_domain.as_deref() {
            if let Some((local, host)) = login.rsplit_once('@') {
                if host.eq_ignore_ascii_case(domain) {
                    return local.to_string();
                }
            }
        }
        login.to_string()
    }

    async fn provisioning(&self, device: &Device) -> AppResult<ProvisioningMode> {
        Ok(self
            .config
            .user(&device.user)
            .and_then(|u| u.provisioning)
            .unwrap_or(self.config.provisioning))
    }

    async fn version_callback(
        &self,
        user: &str,
        _device_id: &str,
    ) -> AppResult<Option<ProtocolVersion>> {
        Ok(self.config.user(user).and_then(|u| u.max_version))
    }

    async fn create_device_callback(&self, device: &Device) -> AppResult<DeviceVerdict> {
        if self.is_device_denied(&device.id) {
            tracing::warn!("Refusing new device {} for {}", device.id, device.user);
            return Ok(DeviceVerdict::Deny(GlobalStatus::DeviceBlockedForUser));
        }
        Ok(DeviceVerdict::Allow)
    }

    async fn device_callback(&self, device: &Device) -> AppResult<DeviceVerdict> {
        if self.is_device_denied(&device.id) {
            return Ok(DeviceVerdict::Deny(GlobalStatus::DeviceBlockedForUser));
        }
        Ok(DeviceVerdict::Allow)
    }
}
