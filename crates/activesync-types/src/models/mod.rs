//! Core domain models for the ActiveSync gateway.
//!
//! This module contains all shared data structures used across the workspace.

mod command;
mod config;
mod device;
mod status;
mod version;

// Re-export all models
pub use command::Command;
pub use config::{ServerConfig, UserEntry};
pub use device::{normalize_device_type, Device, RemoteWipeStatus};
pub use status::{GlobalStatus, ProvisioningMode};
pub use version::ProtocolVersion;
