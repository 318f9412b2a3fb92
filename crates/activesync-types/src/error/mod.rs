//! Typed error definitions for the ActiveSync gateway.
//!
//! One enum per domain. Every error is serde-serializable and derives its
//! `Display` through thiserror; `activesync-core` wraps them in `AppError`.

mod config;
mod device;
mod protocol;

pub use config::ConfigError;
pub use device::DeviceError;
pub use protocol::ProtocolError;
