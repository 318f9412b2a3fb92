//! # ActiveSync Core
//!
//! The negotiation, device and dispatch layer that sits in front of every
//! ActiveSync command.
//!
//! ## Architecture
//!
//! ```text
//! activesync-core/src/
//! ├── request/          # Query/header parsing and credential extraction
//! ├── version.rs        # Protocol version resolution and advertised ceiling
//! ├── registry.rs       # Per-device/per-user state machine
//! ├── provisioning.rs   # Policy key gate (HTTP 449)
//! ├── router.rs         # Command -> handler mapping with folder aliases
//! ├── headers.rs        # Capability/version/command response headers
//! ├── wbxml.rs          # WBXML preamble reader
//! ├── context.rs        # Request-scoped state
//! ├── dispatcher.rs     # Per-request orchestration
//! ├── backend/          # Backend driver trait + config-driven implementation
//! ├── store/            # Device state stores (SQLite, in-memory)
//! ├── config.rs         # Config file location, load and save
//! └── logger.rs         # tracing subscriber setup
//! ```
//!
//! Nothing here is process-global: the resolved device, negotiated version and
//! sticky global status travel in a [`context::RequestContext`] owned by the
//! request being served.

#![allow(
    clippy::redundant_else,
    reason = "Explicit else blocks improve readability in complex control flow"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(test, allow(clippy::panic, clippy::print_stdout, clippy::assertions_on_result_states))]

pub mod backend;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod headers;
pub mod logger;
pub mod provisioning;
pub mod registry;
pub mod request;
pub mod router;
pub mod store;
pub mod version;
pub mod wbxml;

#[cfg(test)]
mod dispatcher_tests;
#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use backend::{AuthOutcome, Backend, ConfiguredBackend, DeviceVerdict};
pub use context::RequestContext;
pub use dispatcher::{ActiveSyncRequest, ActiveSyncResponse, Dispatcher};
pub use error::{AppError, AppResult};
pub use registry::DeviceRegistry;
pub use router::{CommandHandler, CommandRouter, HandlerOutcome};
pub use store::{DeviceStore, MemoryDeviceStore, SqliteDeviceStore, StoreError};

/// Version reported in the `Server` response header.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
