use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

use activesync_core::backend::hash_password;
use activesync_core::config::{database_path, update_config};
use activesync_core::{DeviceRegistry, SqliteDeviceStore};
use activesync_types::{Device, RemoteWipeStatus, ServerConfig, UserEntry};

use crate::cli::DeviceCommands;

/// Open the device database the server would use.
pub fn open_registry(config: &ServerConfig) -> Result<DeviceRegistry> {
    let path = database_path(config).map_err(|e| anyhow::anyhow!(e))?;
    let store = SqliteDeviceStore::open(&path)
        .with_context(|| format!("Failed to open device database {}", path.display()))?;
    Ok(DeviceRegistry::new(Arc::new(store)))
}

pub async fn handle_device_command(cmd: DeviceCommands, config: &ServerConfig) -> Result<()> {
    let registry = open_registry(config)?;
    match cmd {
        DeviceCommands::List { user, json } => list_devices(&registry, user.as_deref(), json).await,
        DeviceCommands::Block { id } => {
            registry.set_blocked(&id, true).await?;
            println!("{} Device {} blocked", "✓".green(), Device::normalize_id(&id));
            Ok(())
        },
        DeviceCommands::Unblock { id } => {
            registry.set_blocked(&id, false).await?;
            println!("{} Device {} unblocked", "✓".green(), Device::normalize_id(&id));
            Ok(())
        },
        DeviceCommands::Wipe { id } => {
            registry.request_wipe(&id).await?;
            println!(
                "{} Remote wipe scheduled for {}; it is delivered on the next provisioning",
                "⚠".yellow(),
                Device::normalize_id(&id)
            );
            Ok(())
        },
        DeviceCommands::Remove { id, user } => {
            registry.remove(&id, user.as_deref()).await?;
            println!(
                "{} Removed {} ({})",
                "✓".green(),
                Device::normalize_id(&id),
                user.as_deref().unwrap_or("all users")
            );
            Ok(())
        },
    }
}

async fn list_devices(registry: &DeviceRegistry, user: Option<&str>, json: bool) -> Result<()> {
    let devices = registry.list(user).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("{}", "No devices found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Device", "User", "Type", "Version", "Policy key", "Status", "Last seen"]);

    for device in &devices {
        table.add_row(vec![
            Cell::new(&device.id),
            Cell::new(&device.user),
            Cell::new(&device.device_type),
            Cell::new(device.version.map_or_else(|| "-".to_string(), |v| v.to_string())),
            Cell::new(device.policykey),
            status_cell(device),
            Cell::new(
                device
                    .last_seen
                    .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
            ),
        ]);
    }

    println!("{table}");
    println!("\n{} device bindings total", devices.len());
    Ok(())
}

fn status_cell(device: &Device) -> Cell {
    if device.blocked {
        return Cell::new("Blocked").fg(Color::Red);
    }
    match device.rwstatus {
        RemoteWipeStatus::Pending => Cell::new("Wipe pending").fg(Color::Yellow),
        RemoteWipeStatus::Wiped => Cell::new("Wiped").fg(Color::Red),
        _ => Cell::new("Active").fg(Color::Green),
    }
}

pub async fn handle_reset_policy_keys(config: &ServerConfig) -> Result<()> {
    let registry = open_registry(config)?;
    let count = registry.reset_all_policy_keys().await?;
    println!("{} Reset {} policy keys; devices will provision again", "✓".green(), count);
    Ok(())
}

pub fn handle_hash_password(password: &str) -> Result<()> {
    println!("{}", hash_password(password));
    Ok(())
}

/// Insert or update a user entry in the config file at `path`.
pub fn set_user(path: &Path, username: &str, password: &str) -> Result<ServerConfig> {
    let password_sha256 = hash_password(password);
    update_config(path, |config| {
        match config.users.iter_mut().find(|u| u.username.eq_ignore_ascii_case(username)) {
            Some(entry) => entry.password_sha256 = password_sha256,
            None => config.users.push(UserEntry {
                username: username.to_string(),
                password_sha256,
                provisioning: None,
                max_version: None,
            }),
        }
    })
    .with_context(|| format!("Failed to update {}", path.display()))
}

pub fn handle_set_user(path: &Path, username: &str, password: &str) -> Result<()> {
    let config = set_user(path, username, password)?;
    println!(
        "{} {} saved to {} ({} users configured)",
        "✓".green(),
        username,
        path.display(),
        config.users.len()
    );
    Ok(())
}
