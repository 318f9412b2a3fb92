//! Test helpers for activesync-server unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use tempfile::TempDir;

use activesync_core::backend::hash_password;
use activesync_core::{
    AppResult, CommandHandler, CommandRouter, HandlerOutcome, RequestContext, SqliteDeviceStore,
};
use activesync_types::{Command, Device, ProtocolVersion, ServerConfig, UserEntry};

use crate::state::AppState;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const USER: &str = "alice";
pub const PASSWORD: &str = "secret";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        admin_api_key: ADMIN_KEY.to_string(),
        users: vec![UserEntry {
            username: USER.to_string(),
            password_sha256: hash_password(PASSWORD),
            provisioning: None,
            max_version: None,
        }],
        ..ServerConfig::default()
    }
}

/// Writes a fixed body for any command it is registered for.
pub struct StaticHandler(pub &'static [u8]);

#[async_trait]
impl CommandHandler for StaticHandler {
    async fn handle(
        &self,
        _ctx: &mut RequestContext,
        _request: &[u8],
        response: &mut BytesMut,
    ) -> AppResult<HandlerOutcome> {
        response.extend_from_slice(self.0);
        Ok(HandlerOutcome::Completed(true))
    }
}

/// Create a minimal `AppState` for testing, backed by SQLite in a temp dir.
///
/// Keep the returned `TempDir` alive for the duration of the test.
pub fn test_app_state() -> (AppState, TempDir) {
    test_app_state_with_router(CommandRouter::new())
}

pub fn test_app_state_with_router(router: CommandRouter) -> (AppState, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let store = SqliteDeviceStore::open(&temp_dir.path().join("devices.db"))
        .expect("failed to open test database");
    let state = AppState::with_router(test_config(), Arc::new(store), router);
    (state, temp_dir)
}

/// Router with a `Ping` handler answering `pong`.
pub fn ping_router() -> CommandRouter {
    CommandRouter::new().register(Command::Ping, Arc::new(StaticHandler(b"pong")))
}

/// Persist a provisioned-looking device binding.
pub async fn seed_device(state: &AppState, id: &str, user: &str) -> Device {
    let mut device = Device::new(id, user);
    device.user_agent = Some("TestAgent/1.0".to_string());
    device.device_type = "iPhone".to_string();
    device.version = Some(ProtocolVersion::V14_1);
    state.registry().save(&mut device).await.expect("failed to seed device");
    device
}
