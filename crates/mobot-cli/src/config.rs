//! Tuning file – reads/writes `~/.mobot/config.toml`.
//!
//! The file holds every tunable the robot has asked for, grouped by prefix:
//!
//! ```toml
//! [distanceChecker]
//! stopDistance = 0.2
//! slowdownDistance = 1.0
//!
//! [wander.scan]
//! inc = 10
//! ```
//!
//! Keys the robot reads for the first time are added with their defaults, so
//! saving on exit leaves a complete, editable file behind.

use std::fs;
use std::path::{Path, PathBuf};

use mobot_kernel::{ConfigStore, ConfigValue};
use mobot_runtime::LogFormat;

/// Return the config path: `MOBOT_CONFIG` if set, else
/// `~/.mobot/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("MOBOT_CONFIG") {
        return PathBuf::from(p);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mobot").join("config.toml")
}

/// Load the store from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<ConfigStore>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let store = ConfigStore::from_toml_str(&raw).map_err(|e| e.to_string())?;
    Ok(Some(store))
}

/// Console log format: `MOBOT_LOG_FORMAT` wins over `log.format` in the
/// file.
pub fn log_format(store: &ConfigStore) -> LogFormat {
    if let Ok(v) = std::env::var("MOBOT_LOG_FORMAT") {
        return LogFormat::parse(&v);
    }
    match store.get("log.format") {
        Some(ConfigValue::Text(v)) => LogFormat::parse(&v),
        _ => LogFormat::default(),
    }
}

/// Save the store to `path`, creating the parent directory if necessary,
/// and mark it clean.
pub fn save_to(store: &ConfigStore, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = store.to_toml_string().map_err(|e| e.to_string())?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    store.mark_clean();
    Ok(())
}
