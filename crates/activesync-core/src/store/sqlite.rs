//! SQLite-backed device store.

use std::path::Path;
use std::str::FromStr;

use activesync_types::{Device, ProtocolVersion, RemoteWipeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{DeviceStore, StoreError, StoreResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS devices (
    device_id TEXT PRIMARY KEY,
    device_type TEXT NOT NULL DEFAULT '',
    user_agent TEXT,
    rwstatus INTEGER NOT NULL DEFAULT 0,
    blocked INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS device_users (
    device_id TEXT NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
    user TEXT NOT NULL,
    policykey INTEGER NOT NULL DEFAULT 0,
    version TEXT,
    announced_versions TEXT,
    last_seen TEXT,
    PRIMARY KEY (device_id, user)
);
CREATE INDEX IF NOT EXISTS idx_device_users_user ON device_users (user);
";

const SELECT_DEVICE: &str = "
SELECT d.device_id, u.user, u.version, u.policykey, d.rwstatus, d.user_agent,
       d.device_type, d.blocked, u.announced_versions, u.last_seen
FROM devices d JOIN device_users u ON u.device_id = d.device_id";

/// [`DeviceStore`] persisted in a single SQLite file.
pub struct SqliteDeviceStore {
    conn: Mutex<Connection>,
}

impl SqliteDeviceStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Device store schema ready");
        Ok(Self { conn: Mutex::new(conn) })
    }
}

fn row_to_device(row: &Row<'_>) -> rusqlite::Result<Device> {
    let version: Option<String> = row.get(2)?;
    let policykey: i64 = row.get(3)?;
    let last_seen: Option<String> = row.get(9)?;

    Ok(Device {
        id: row.get(0)?,
        user: row.get(1)?,
        version: version.and_then(|v| ProtocolVersion::from_str(&v).ok()),
        policykey: u32::try_from(policykey).unwrap_or_default(),
        rwstatus: RemoteWipeStatus::from_code(row.get(4)?),
        user_agent: row.get(5)?,
        device_type: row.get(6)?,
        blocked: row.get(7)?,
        announced_versions: row.get(8)?,
        last_seen: last_seen
            .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
            .map(|ts| ts.with_timezone(&Utc)),
    })
}

fn not_found_if_zero(rows: usize, what: String) -> StoreResult<()> {
    if rows == 0 {
        return Err(StoreError::NotFound(what));
    }
    Ok(())
}

#[async_trait]
impl DeviceStore for SqliteDeviceStore {
    async fn device_exists(&self, id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM devices WHERE device_id = ?1",
                params![Device::normalize_id(id)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn device_exists_for_user(&self, id: &str, user: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM device_users WHERE device_id = ?1 AND user = ?2",
                params![Device::normalize_id(id), user],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn load_device(&self, id: &str, user: Option<&str>) -> StoreResult<Option<Device>> {
        let conn = self.conn.lock();
        let id = Device::normalize_id(id);
        let device = match user {
            Some(user) => conn
                .query_row(
                    &format!("{} WHERE d.device_id = ?1 AND u.user = ?2", SELECT_DEVICE),
                    params![id, user],
                    row_to_device,
                )
                .optional()?,
            None => conn
                .query_row(
                    &format!("{} WHERE d.device_id = ?1 ORDER BY u.user LIMIT 1", SELECT_DEVICE),
                    params![id],
                    row_to_device,
                )
                .optional()?,
        };
        Ok(device)
    }

    async fn save_device(&self, device: &Device) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = Device::normalize_id(&device.id);

        let _rows_affected: usize = tx.execute(
            "INSERT INTO devices (device_id, device_type, user_agent, rwstatus, blocked)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(device_id) DO UPDATE SET
                device_type = excluded.device_type,
                user_agent = excluded.user_agent,
                rwstatus = excluded.rwstatus,
                blocked = excluded.blocked",
            params![id, device.device_type, device.user_agent, device.rwstatus.code(), device.blocked],
        )?;
        let _rows_affected: usize = tx.execute(
            "INSERT INTO device_users (device_id, user, policykey, version, announced_versions, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(device_id, user) DO UPDATE SET
                policykey = excluded.policykey,
                version = excluded.version,
                announced_versions = excluded.announced_versions,
                last_seen = excluded.last_seen",
            params![
                id,
                device.user,
                i64::from(device.policykey),
                device.version.map(|v| v.as_str()),
                device.announced_versions,
                device.last_seen.map(|ts| ts.to_rfc3339()),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    async fn list_devices(&self, user: Option<&str>) -> StoreResult<Vec<Device>> {
        let conn = self.conn.lock();
        let devices = match user {
            Some(user) => {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE u.user = ?1 ORDER BY d.device_id, u.user",
                    SELECT_DEVICE
                ))?;
                let rows = stmt.query_map(params![user], row_to_device)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            },
            None => {
                let mut stmt =
                    conn.prepare(&format!("{} ORDER BY d.device_id, u.user", SELECT_DEVICE))?;
                let rows = stmt.query_map([], row_to_device)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            },
        };
        Ok(devices)
    }

    async fn set_policy_key(&self, id: &str, user: &str, key: u32) -> StoreResult<()> {
        let conn = self.conn.lock();
        let id = Device::normalize_id(id);
        let rows = conn.execute(
            "UPDATE device_users SET policykey = ?1 WHERE device_id = ?2 AND user = ?3",
            params![i64::from(key), id, user],
        )?;
        not_found_if_zero(rows, format!("{} for {}", id, user))
    }

    async fn reset_all_policy_keys(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let rows = conn.execute("UPDATE device_users SET policykey = 0", [])?;
        Ok(rows)
    }

    async fn set_rw_status(&self, id: &str, status: RemoteWipeStatus) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let id = Device::normalize_id(id);
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE devices SET rwstatus = ?1 WHERE device_id = ?2",
            params![status.code(), id],
        )?;
        if status == RemoteWipeStatus::Pending {
            let _rows_affected: usize = tx.execute(
                "UPDATE device_users SET policykey = 0 WHERE device_id = ?1",
                params![id],
            )?;
        }
        tx.commit()?;
        not_found_if_zero(rows, id)
    }

    async fn set_blocked(&self, id: &str, blocked: bool) -> StoreResult<()> {
        let conn = self.conn.lock();
        let id = Device::normalize_id(id);
        let rows = conn.execute(
            "UPDATE devices SET blocked = ?1 WHERE device_id = ?2",
            params![blocked, id],
        )?;
        not_found_if_zero(rows, id)
    }

    async fn remove_device(&self, id: &str, user: Option<&str>) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let id = Device::normalize_id(id);
        let tx = conn.transaction()?;

        let rows = match user {
            Some(user) => {
                let rows = tx.execute(
                    "DELETE FROM device_users WHERE device_id = ?1 AND user = ?2",
                    params![id, user],
                )?;
                let _rows_affected: usize = tx.execute(
                    "DELETE FROM devices WHERE device_id = ?1
                     AND NOT EXISTS (SELECT 1 FROM device_users WHERE device_id = ?1)",
                    params![id],
                )?;
                rows
            },
            None => {
                let _rows_affected: usize =
                    tx.execute("DELETE FROM device_users WHERE device_id = ?1", params![id])?;
                tx.execute("DELETE FROM devices WHERE device_id = ?1", params![id])?
            },
        };

        tx.commit()?;
        not_found_if_zero(rows, id)
    }
}
