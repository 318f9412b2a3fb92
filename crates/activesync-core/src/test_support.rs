//! Fixtures shared by the core's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use activesync_types::{
    Device, GlobalStatus, ProtocolVersion, ProvisioningMode, RemoteWipeStatus, ServerConfig,
};
use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;

use crate::backend::{AuthOutcome, Backend, DeviceVerdict};
use crate::context::RequestContext;
use crate::error::AppResult;
use crate::registry::DeviceRegistry;
use crate::router::{CommandHandler, CommandRouter, HandlerOutcome};
use crate::store::{DeviceStore, MemoryDeviceStore, StoreResult};
use crate::Dispatcher;

pub const PASSWORD: &str = "secret";

/// Backend accepting any user whose password is [`PASSWORD`].
#[derive(Debug, Default)]
pub struct MockBackend {
    /// Outcome for a correct password (default: accepted)
    pub outcome: Option<AuthOutcome>,
    pub provisioning: ProvisioningMode,
    pub deny_new_devices: bool,
    pub deny_devices: bool,
    pub ceiling: Option<ProtocolVersion>,
}

#[async_trait]
impl Backend for MockBackend {
    async fn authenticate(
        &self,
        _username: &str,
        password: &str,
        _domain: Option<&str>,
    ) -> AppResult<AuthOutcome> {
        if password != PASSWORD {
            return Ok(AuthOutcome::Rejected);
        }
        Ok(self.outcome.unwrap_or(AuthOutcome::Accepted))
    }

    async fn provisioning(&self, _device: &Device) -> AppResult<ProvisioningMode> {
        Ok(self.provisioning)
    }

    async fn version_callback(
        &self,
        _user: &str,
        _device_id: &str,
    ) -> AppResult<Option<ProtocolVersion>> {
        Ok(self.ceiling)
    }

    async fn create_device_callback(&self, _device: &Device) -> AppResult<DeviceVerdict> {
        if self.deny_new_devices {
            return Ok(DeviceVerdict::Deny(GlobalStatus::DeviceBlockedForUser));
        }
        Ok(DeviceVerdict::Allow)
    }

    async fn device_callback(&self, _device: &Device) -> AppResult<DeviceVerdict> {
        if self.deny_devices {
            return Ok(DeviceVerdict::Deny(GlobalStatus::Denied));
        }
        Ok(DeviceVerdict::Allow)
    }
}

/// Handler that records what it was called with and writes `ok`.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub calls: AtomicUsize,
    pub global_errors: Mutex<Vec<Option<GlobalStatus>>>,
    pub outcome: Option<HandlerOutcome>,
    /// Policy key assigned to the device, as Provision would
    pub assign_policy_key: Option<u32>,
}

impl RecordingHandler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        _request: &[u8],
        response: &mut BytesMut,
    ) -> AppResult<HandlerOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.global_errors.lock().push(ctx.global_error);

        if let (Some(key), Some(device)) = (self.assign_policy_key, ctx.device.as_mut()) {
            device.policykey = key;
        }
        response.extend_from_slice(b"ok");
        Ok(self.outcome.clone().unwrap_or(HandlerOutcome::Completed(true)))
    }
}

/// Store wrapper counting every call.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryDeviceStore,
    pub calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceStore for CountingStore {
    async fn device_exists(&self, id: &str) -> StoreResult<bool> {
        self.hit();
        self.inner.device_exists(id).await
    }

    async fn device_exists_for_user(&self, id: &str, user: &str) -> StoreResult<bool> {
        self.hit();
        self.inner.device_exists_for_user(id, user).await
    }

    async fn load_device(&self, id: &str, user: Option<&str>) -> StoreResult<Option<Device>> {
        self.hit();
        self.inner.load_device(id, user).await
    }

    async fn save_device(&self, device: &Device) -> StoreResult<()> {
        self.hit();
        self.inner.save_device(device).await
    }

    async fn list_devices(&self, user: Option<&str>) -> StoreResult<Vec<Device>> {
        self.hit();
        self.inner.list_devices(user).await
    }

    async fn set_policy_key(&self, id: &str, user: &str, key: u32) -> StoreResult<()> {
        self.hit();
        self.inner.set_policy_key(id, user, key).await
    }

    async fn reset_all_policy_keys(&self) -> StoreResult<usize> {
        self.hit();
        self.inner.reset_all_policy_keys().await
    }

    async fn set_rw_status(&self, id: &str, status: RemoteWipeStatus) -> StoreResult<()> {
        self.hit();
        self.inner.set_rw_status(id, status).await
    }

    async fn set_blocked(&self, id: &str, blocked: bool) -> StoreResult<()> {
        self.hit();
        self.inner.set_blocked(id, blocked).await
    }

    async fn remove_device(&self, id: &str, user: Option<&str>) -> StoreResult<()> {
        self.hit();
        self.inner.remove_device(id, user).await
    }
}

/// Dispatcher wired to the given backend, store and handlers.
pub fn dispatcher(
    config: ServerConfig,
    backend: MockBackend,
    store: Arc<dyn DeviceStore>,
    router: CommandRouter,
) -> Dispatcher {
    Dispatcher::new(Arc::new(config), Arc::new(backend), DeviceRegistry::new(store), router)
}
