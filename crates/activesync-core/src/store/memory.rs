//! In-memory device store for tests and ephemeral runs.

use std::collections::BTreeMap;

use activesync_types::{Device, ProtocolVersion, RemoteWipeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{DeviceStore, StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct Handset {
    device_type: String,
    user_agent: Option<String>,
    rwstatus: RemoteWipeStatus,
    blocked: bool,
    users: BTreeMap<String, Binding>,
}

#[derive(Debug, Clone, Default)]
struct Binding {
    policykey: u32,
    version: Option<ProtocolVersion>,
    announced_versions: Option<String>,
    last_seen: Option<DateTime<Utc>>,
}

impl Handset {
    fn device(&self, id: &str, user: &str, binding: &Binding) -> Device {
        Device {
            id: id.to_string(),
            user: user.to_string(),
            version: binding.version,
            policykey: binding.policykey,
            rwstatus: self.rwstatus,
            user_agent: self.user_agent.clone(),
            device_type: self.device_type.clone(),
            blocked: self.blocked,
            announced_versions: binding.announced_versions.clone(),
            last_seen: binding.last_seen,
        }
    }
}

/// [`DeviceStore`] kept in a [`DashMap`] keyed by device id.
#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    devices: DashMap<String, Handset>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn device_exists(&self, id: &str) -> StoreResult<bool> {
        Ok(self.devices.contains_key(&Device::normalize_id(id)))
    }

    async fn device_exists_for_user(&self, id: &str, user: &str) -> StoreResult<bool> {
        Ok(self
            .devices
            .get(&Device::normalize_id(id))
            .is_some_and(|handset| handset.users.contains_key(user)))
    }

    async fn load_device(&self, id: &str, user: Option<&str>) -> StoreResult<Option<Device>> {
        let id = Device::normalize_id(id);
        let Some(handset) = self.devices.get(&id) else {
            return Ok(None);
        };
        let found = match user {
            Some(user) => handset.users.get_key_value(user),
            None => handset.users.iter().next(),
        };
        Ok(found.map(|(user, binding)| handset.device(&id, user, binding)))
    }

    async fn save_device(&self, device: &Device) -> StoreResult<()> {
        let mut handset = self.devices.entry(Device::normalize_id(&device.id)).or_default();
        handset.device_type = device.device_type.clone();
        handset.user_agent = device.user_agent.clone();
        handset.rwstatus = device.rwstatus;
        handset.blocked = device.blocked;
        handset.users.insert(
            device.user.clone(),
            Binding {
                policykey: device.policykey,
                version: device.version,
                announced_versions: device.announced_versions.clone(),
                last_seen: device.last_seen,
            },
        );
        Ok(())
    }

    async fn list_devices(&self, user: Option<&str>) -> StoreResult<Vec<Device>> {
        let mut devices: Vec<Device> = self
            .devices
            .iter()
            .flat_map(|entry| {
                let handset = entry.value();
                handset
                    .users
                    .iter()
                    .filter(|(u, _)| user.map_or(true, |wanted| wanted == u.as_str()))
                    .map(|(u, binding)| handset.device(entry.key(), u, binding))
                    .collect::<Vec<_>>()
            })
            .collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.user.cmp(&b.user)));
        Ok(devices)
    }

    async fn set_policy_key(&self, id: &str, user: &str, key: u32) -> StoreResult<()> {
        let id = Device::normalize_id(id);
        let mut handset = self.devices.get_mut(&id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let binding = handset
            .users
            .get_mut(user)
            .ok_or_else(|| StoreError::NotFound(format!("{} for {}", id, user)))?;
        binding.policykey = key;
        Ok(())
    }

    async fn reset_all_policy_keys(&self) -> StoreResult<usize> {
        let mut touched = 0;
        for mut entry in self.devices.iter_mut() {
            for binding in entry.value_mut().users.values_mut() {
                binding.policykey = 0;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn set_rw_status(&self, id: &str, status: RemoteWipeStatus) -> StoreResult<()> {
        let id = Device::normalize_id(id);
        let mut handset = self.devices.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        handset.rwstatus = status;
        if status == RemoteWipeStatus::Pending {
            for binding in handset.users.values_mut() {
                binding.policykey = 0;
            }
        }
        Ok(())
    }

    async fn set_blocked(&self, id: &str, blocked: bool) -> StoreResult<()> {
        let id = Device::normalize_id(id);
        let mut handset = self.devices.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        handset.blocked = blocked;
        Ok(())
    }

    async fn remove_device(&self, id: &str, user: Option<&str>) -> StoreResult<()> {
        let id = Device::normalize_id(id);
        let Some(user) = user else {
            return self.devices.remove(&id).map(|_| ()).ok_or(StoreError::NotFound(id));
        };

        let now_empty = {
            let mut handset =
                self.devices.get_mut(&id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if handset.users.remove(user).is_none() {
                return Err(StoreError::NotFound(format!("{} for {}", id, user)));
            }
            handset.users.is_empty()
        };
        if now_empty {
            self.devices.remove(&id);
        }
        Ok(())
    }
}
