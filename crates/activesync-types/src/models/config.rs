//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{ProtocolVersion, ProvisioningMode};
use crate::error::ConfigError;

/// A backend account allowed to sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntry {
    /// Backend username (without domain)
    pub username: String,
    /// Lowercase hex SHA-256 of the password
    pub password_sha256: String,
    /// Per-user provisioning override
    #[serde(default)]
    pub provisioning: Option<ProvisioningMode>,
    /// Per-user protocol ceiling, applied through the version callback
    #[serde(default)]
    pub max_version: Option<ProtocolVersion>,
}

/// Full server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Highest protocol version the server advertises
    #[serde(default)]
    pub max_version: ProtocolVersion,
    /// Product name used in the `Server` header
    pub product_name: String,
    /// Realm announced in `WWW-Authenticate`
    pub realm: String,
    /// SQLite database for device state (defaults to the data dir)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// API key protecting the admin API; empty disables the admin API
    #[serde(default)]
    pub admin_api_key: String,
    /// Provisioning mode for users without an override
    #[serde(default)]
    pub provisioning: ProvisioningMode,
    /// Mail domain stripped from `user@domain` logins
    #[serde(default)]
    pub email_domain: Option<String>,
    /// Accounts allowed to authenticate
    #[serde(default)]
    pub users: Vec<UserEntry>,
    /// Accounts that authenticate but may not sync
    #[serde(default)]
    pub denied_users: Vec<String>,
    /// Device ids refused for every user
    #[serde(default)]
    pub denied_devices: Vec<String>,
}

impl ServerConfig {
    /// Create default configuration.
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8046,
            max_version: ProtocolVersion::LATEST,
            product_name: "ActiveSync_Gateway".to_string(),
            realm: "ActiveSync".to_string(),
            database_path: None,
            admin_api_key: String::new(),
            provisioning: ProvisioningMode::Disabled,
            email_domain: None,
            users: Vec::new(),
            denied_users: Vec::new(),
            denied_devices: Vec::new(),
        }
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_version < ProtocolVersion::V2_5 {
            return Err(ConfigError::InvalidValue {
                field: "max_version".to_string(),
                message: format!("{} cannot be advertised", self.max_version),
            });
        }
        if self.product_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "product_name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if let Some(user) = self.users.iter().find(|u| u.password_sha256.len() != 64) {
            return Err(ConfigError::InvalidValue {
                field: format!("users.{}", user.username),
                message: "password_sha256 must be 64 hex characters".to_string(),
            });
        }
        Ok(())
    }

    /// Look up a configured account.
    pub fn user(&self, username: &str) -> Option<&UserEntry> {
        self.users.iter().find(|u| u.username.eq_ignore_ascii_case(username))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
