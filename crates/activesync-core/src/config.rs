//! Server configuration persistence.
//!
//! The configuration lives as pretty-printed JSON in the data directory
//! (`~/.activesync_gateway/gateway_config.json`) unless an explicit path is given.

use std::fs;
use std::path::{Path, PathBuf};

use activesync_types::{ConfigError, ServerConfig};

/// Directory name for gateway data.
const DATA_DIR: &str = ".activesync_gateway";
/// Configuration filename inside the data directory.
const CONFIG_FILE: &str = "gateway_config.json";
/// Device state database filename inside the data directory.
const DATABASE_FILE: &str = "devices.db";

/// Gets the data directory path, creating it if necessary.
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| ConfigError::File {
        path: "~".to_string(),
        message: "failed_to_get_home_dir".to_string(),
    })?;
    let data_dir = home.join(DATA_DIR);
    if !data_dir.exists() {
        fs::create_dir_all(&data_dir).map_err(|e| ConfigError::File {
            path: data_dir.display().to_string(),
            message: format!("failed_to_create_data_dir: {}", e),
        })?;
    }
    Ok(data_dir)
}

/// Default configuration file location.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(get_data_dir()?.join(CONFIG_FILE))
}

/// Database path configured, or the data-dir default.
pub fn database_path(config: &ServerConfig) -> Result<PathBuf, ConfigError> {
    match &config.database_path {
        Some(path) => Ok(path.clone()),
        None => Ok(get_data_dir()?.join(DATABASE_FILE)),
    }
}

/// Load and validate the configuration at `path`.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    if !path.exists() {
        tracing::info!("config_missing, using defaults: {}", path.display());
        return Ok(ServerConfig::new());
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let config: ServerConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse { message: e.to_string() })?;
    config.validate()?;
    Ok(config)
}

/// Save the configuration to `path` atomically.
pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    let file_error = |e: std::io::Error| ConfigError::File {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    let temp_path = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Parse { message: e.to_string() })?;

    // Atomic write
    fs::write(&temp_path, content).map_err(file_error)?;
    fs::rename(&temp_path, path).map_err(file_error)
}

/// Update specific fields in the config.
pub fn update_config<F>(path: &Path, updater: F) -> Result<ServerConfig, ConfigError>
where
    F: FnOnce(&mut ServerConfig),
{
    let mut config = load_config(path)?;
    updater(&mut config);
    config.validate()?;
    save_config(path, &config)?;
    Ok(config)
}
