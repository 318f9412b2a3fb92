//! Device state storage abstraction.
//!
//! State is split the way handsets are: the physical device (type, agent,
//! wipe status, block flag) and one binding per user (policy key, negotiated
//! version). A [`Device`] is the join of both for one (`id`, `user`) pair.

mod memory;
mod sqlite;


pub use memory::MemoryDeviceStore;
pub use sqlite::SqliteDeviceStore;

use activesync_types::{Device, RemoteWipeStatus};
use async_trait::async_trait;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Device not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Whether any user has state for this device.
    async fn device_exists(&self, id: &str) -> StoreResult<bool>;
    async fn device_exists_for_user(&self, id: &str, user: &str) -> StoreResult<bool>;
    /// Load the binding for `user`, or the first binding of any user when `user` is `None`.
    async fn load_device(&self, id: &str, user: Option<&str>) -> StoreResult<Option<Device>>;
    /// Insert or update both the device and the user binding.
    async fn save_device(&self, device: &Device) -> StoreResult<()>;
    /// All bindings, optionally restricted to one user, ordered by device id then user.
    async fn list_devices(&self, user: Option<&str>) -> StoreResult<Vec<Device>>;
    async fn set_policy_key(&self, id: &str, user: &str, key: u32) -> StoreResult<()>;
    /// Force every binding to re-provision. Returns the number of bindings touched.
    async fn reset_all_policy_keys(&self) -> StoreResult<usize>;
    /// Setting [`RemoteWipeStatus::Pending`] also clears every user's policy key.
    async fn set_rw_status(&self, id: &str, status: RemoteWipeStatus) -> StoreResult<()>;
    async fn set_blocked(&self, id: &str, blocked: bool) -> StoreResult<()>;
    /// Remove one user's binding, or the whole device when `user` is `None`.
    /// The device row goes away once its last binding is removed.
    async fn remove_device(&self, id: &str, user: Option<&str>) -> StoreResult<()>;
}
