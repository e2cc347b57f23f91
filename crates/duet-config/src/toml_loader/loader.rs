//! Reading, parsing and seeding the TOML config file.

use std::io;
use std::path::{Path, PathBuf};

use duet_common::ConfigError;
use tracing::{info, warn};

use super::template::default_config_toml;
use crate::schema::DuetConfig;
use crate::validation;

/// `<platform config dir>/duet/config.toml`, e.g. `~/.config/duet/config.toml`
/// on Linux.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("duet").join("config.toml"))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory".into()))
}

/// Read and parse `path`. Missing tables and fields take their defaults.
///
/// Out-of-range values are only warned about here; [`crate::load_config`]
/// is the strict entry point.
pub fn load_from_path(path: &Path) -> Result<DuetConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(io_error("read", path, e)),
    };

    let config: DuetConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), error = %e, "Config has invalid values");
    }
    info!(path = %path.display(), "Config loaded");
    Ok(config)
}

/// Load the config at [`default_config_path`], seeding it with the
/// commented template on first run.
pub fn load_default() -> Result<DuetConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(DuetConfig::default())
        }
        loaded => loaded,
    }
}

/// Write the commented template to `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error("create directory for", path, e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| io_error("write", path, e))?;
    info!(path = %path.display(), "Wrote default config");
    Ok(())
}

fn io_error(action: &str, path: &Path, e: io::Error) -> ConfigError {
    ConfigError::ParseError(format!("failed to {action} {}: {e}", path.display()))
}
