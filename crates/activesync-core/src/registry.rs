//! Per-device, per-user state resolution.
//!
//! Every request walks the same path:
//! `Unresolved -> Loaded | Created -> (Repaired) -> Saved -> PolicyChecked`.
//! The device is saved before the veto and block checks so a denied device
//! is still recorded.

use std::sync::Arc;

use activesync_types::{
    normalize_device_type, Device, DeviceError, GlobalStatus, ProtocolError, RemoteWipeStatus,
};
use chrono::Utc;

use crate::backend::{Backend, DeviceVerdict};
use crate::context::RequestContext;
use crate::error::{AppError, AppResult};
use crate::store::DeviceStore;

#[derive(Clone)]
pub struct DeviceRegistry {
    store: Arc<dyn DeviceStore>,
}

impl DeviceRegistry {
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DeviceStore> {
        &self.store
    }

    pub async fn resolve(&self, id: &str, user: &str) -> AppResult<Option<Device>> {
        Ok(self.store.load_device(id, Some(user)).await?)
    }

    pub async fn exists_for_any_user(&self, id: &str) -> AppResult<bool> {
        Ok(self.store.device_exists(id).await?)
    }

    /// Persist the device, stamping `last_seen`.
    pub async fn save(&self, device: &mut Device) -> AppResult<()> {
        device.last_seen = Some(Utc::now());
        self.store.save_device(device).await?;
        Ok(())
    }

    // Administrative operations

    pub async fn list(&self, user: Option<&str>) -> AppResult<Vec<Device>> {
        Ok(self.store.list_devices(user).await?)
    }

    pub async fn set_blocked(&self, id: &str, blocked: bool) -> AppResult<()> {
        self.store.set_blocked(id, blocked).await?;
        tracing::info!("Device {} {}", id, if blocked { "blocked" } else { "unblocked" });
        Ok(())
    }

    /// Schedule a remote wipe; every binding re-provisions to receive it.
    pub async fn request_wipe(&self, id: &str) -> AppResult<()> {
        self.store.set_rw_status(id, RemoteWipeStatus::Pending).await?;
        tracing::warn!("Remote wipe requested for device {}", id);
        Ok(())
    }

    /// Clear the policy key of one binding, or of every binding of the device.
    /// Returns the number of bindings reset.
    pub async fn reset_policy_key(&self, id: &str, user: Option<&str>) -> AppResult<usize> {
        let id = Device::normalize_id(id);
        if let Some(user) = user {
            self.store.set_policy_key(&id, user, 0).await?;
            return Ok(1);
        }

        let bindings: Vec<Device> =
            self.store.list_devices(None).await?.into_iter().filter(|d| d.id == id).collect();
        if bindings.is_empty() {
            return Err(DeviceError::NotFound { id }.into());
        }
        for binding in &bindings {
            self.store.set_policy_key(&id, &binding.user, 0).await?;
        }
        Ok(bindings.len())
    }

    pub async fn reset_all_policy_keys(&self) -> AppResult<usize> {
        let count = self.store.reset_all_policy_keys().await?;
        tracing::info!("Reset policy keys of {} device bindings", count);
        Ok(count)
    }

    pub async fn remove(&self, id: &str, user: Option<&str>) -> AppResult<()> {
        self.store.remove_device(id, user).await?;
        tracing::info!("Removed device {} ({})", id, user.unwrap_or("all users"));
        Ok(())
    }

    /// Resolve the device for the authenticated user of `ctx`, creating or
    /// repairing it, then apply the backend veto and the block flag.
    ///
    /// On success the device is stored in `ctx.device` and returned.
    pub async fn create_or_load(
        &self,
        ctx: &mut RequestContext,
        backend: &dyn Backend,
    ) -> AppResult<Device> {
        let id = ctx.device_id().map(Device::normalize_id).ok_or(ProtocolError::MissingDeviceId)?;
        let user = ctx
            .user
            .clone()
            .ok_or_else(|| AppError::Authentication("no authenticated user".to_string()))?;
        let version = ctx.protocol_version()?;
        let supported = ctx.versions.supported_versions();

        let mut device = if let Some(stored) = self.resolve(&id, &user).await? {
            let device = load_known(ctx, backend, stored, &user, &supported)?;
            backend.modify_device_callback(device).await?
        } else {
            let mut device = self.seed_new(ctx, &id, &user).await?;
            backend.needs_version_update(&mut device, &supported);

            match backend.create_device_callback(&device).await? {
                DeviceVerdict::Allow => backend.modify_device_callback(device).await?,
                DeviceVerdict::Deny(status) => {
                    if !version.supports_global_status() {
                        tracing::warn!(
                            "[{}] Device {} disallowed for {} per policy",
                            ctx.request_id,
                            id,
                            user
                        );
                        return Err(DeviceError::CreationDenied { id, user }.into());
                    }
                    ctx.set_global_error(status);
                    device
                },
            }
        };

        self.save(&mut device).await?;

        if let DeviceVerdict::Deny(status) = backend.device_callback(&device).await? {
            deny(ctx, status, DeviceError::Denied { id: id.clone(), user: user.clone() })?;
        }

        if device.blocked {
            tracing::info!("[{}] Device {} is blocked", ctx.request_id, id);
            deny(ctx, GlobalStatus::DeviceBlockedForUser, DeviceError::Blocked { id })?;
        }

        ctx.device = Some(device.clone());
        Ok(device)
    }

    /// Build the state of an (id, user) pair seen for the first time.
    ///
    /// A device already bound to another user seeds the descriptive fields and
    /// keeps its handset state (`rwstatus`, `blocked`).
    async fn seed_new(&self, ctx: &mut RequestContext, id: &str, user: &str) -> AppResult<Device> {
        let seed = if self.exists_for_any_user(id).await? {
            self.store.load_device(id, None).await?
        } else {
            None
        };

        let mut device = match seed {
            Some(other) => {
                tracing::info!(
                    "[{}] Device {} known for {}, adding user {}",
                    ctx.request_id,
                    id,
                    other.user,
                    user
                );
                other
            },
            None => {
                tracing::info!("[{}] New device {} for {}", ctx.request_id, id, user);
                Device::new(id, user)
            },
        };

        device.id = id.to_string();
        device.user = user.to_string();
        device.policykey = 0;
        device.announced_versions = None;
        if let Some(agent) = ctx.user_agent() {
            device.user_agent = Some(agent.to_string());
        }
        if !ctx.device_type().is_empty() {
            device.device_type = normalize_device_type(ctx.device_type());
        }
        device.version = Some(ctx.protocol_version()?);
        Ok(device)
    }
}

/// Repair and stamp a binding loaded from the store.
fn load_known(
    ctx: &mut RequestContext,
    backend: &dyn Backend,
    mut device: Device,
    user: &str,
    supported: &str,
) -> AppResult<Device> {
    if !device.has_user_agent() {
        tracing::warn!("[{}] State for {} was removed, rebuilding from request", ctx.request_id, device.id);
        device.user_agent = ctx.user_agent().map(str::to_string);
        device.device_type = normalize_device_type(ctx.device_type());
        device.user = user.to_string();
    }

    if device.version.is_none() {
        device.version = Some(ctx.protocol_version()?);
    }

    let below_max = device.version.is_some_and(|v| v < ctx.versions.max_version());
    if below_max && backend.needs_version_update(&mut device, supported) {
        tracing::debug!("[{}] Announcing protocol upgrade to {}", ctx.request_id, device.id);
        ctx.announce_upgrade = true;
    }
    Ok(device)
}

/// Policy denial: a global status when the version can carry one, else a hard error.
fn deny(ctx: &mut RequestContext, status: GlobalStatus, hard: DeviceError) -> AppResult<()> {
    match ctx.negotiated_version() {
        Some(version) if version.supports_global_status() => {
            ctx.set_global_error(status);
            Ok(())
        },
        _ => Err(hard.into()),
    }
}
