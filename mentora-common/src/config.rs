//! Configuration file and data directory resolution
//!
//! Mentora services keep their TOML configuration under the platform config
//! directory (e.g. `~/.config/mentora/<service>.toml` on Linux) and their
//! SQLite database under the platform data directory
//! (e.g. `~/.local/share/mentora` on Linux). Services layer their own CLI
//! and environment overrides on top of these compiled defaults.
//!
//! Missing config files never abort startup; services fall back to compiled
//! defaults and log a warning.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Get the TOML config file path for a service
///
/// e.g. `config_file_path("relay")` → `~/.config/mentora/relay.toml`
pub fn config_file_path(service_name: &str) -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("mentora").join(format!("{}.toml", service_name)))
        .unwrap_or_else(|| PathBuf::from(format!("{}.toml", service_name)))
}

/// Get OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mentora"))
        .unwrap_or_else(|| PathBuf::from("./mentora_data"))
}

/// Create a directory (and parents) if it does not exist
pub fn ensure_dir_exists(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        debug!("Created directory: {}", dir.display());
    }
    Ok(())
}

/// Load and parse a TOML config file
///
/// Returns `Ok(None)` when the file does not exist (missing configs are not
/// fatal); returns an error only when the file exists but cannot be read or
/// parsed.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        warn!("Config file not found, using defaults: {}", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let parsed = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    Ok(Some(parsed))
}
