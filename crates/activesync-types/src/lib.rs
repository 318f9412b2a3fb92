//! # ActiveSync Types
//!
//! Core types, models, and error definitions for the ActiveSync gateway.
//!
//! This crate provides the foundational type system shared by the protocol core
//! and the server daemon:
//!
//! - **`error`** - Typed error hierarchy for protocol, device and configuration failures
//! - **`models`** - Domain models (Device, ProtocolVersion, Command, ServerConfig)
//!
//! ## Architecture Role
//!
//! `activesync-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!     activesync-types (this crate)
//!              │
//!              ▼
//!      activesync-core
//!              │
//!              ▼
//!     activesync-server
//! ```
//!
//! Wire strings (versions, command names, header values) are only ever produced
//! from the closed enums defined here, so an unsupported value is rejected at
//! construction time instead of leaking onto the wire.

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{ConfigError, DeviceError, ProtocolError};

// Re-export core model types
pub use models::{
    normalize_device_type, Command, Device, GlobalStatus, ProtocolVersion, ProvisioningMode,
    RemoteWipeStatus, ServerConfig, UserEntry,
};
