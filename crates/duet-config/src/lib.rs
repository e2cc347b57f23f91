//! Duet configuration system.
//!
//! TOML-based configuration for the call core: call limits, voice activity
//! detection, microphone constraints, ICE servers, the signaling relay, and
//! logging. All sections use sensible defaults so partial configs work out
//! of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use duet_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{DuetConfig, CONFIG_SCHEMA_VERSION};

use std::path::Path;

use duet_common::ConfigError;

/// Load config from `path`, or from the platform default path when `None`.
///
/// The default path is created with a commented template if missing.
/// Validation failures are returned as errors here, unlike the loaders,
/// which only warn.
pub fn load_config(path: Option<&Path>) -> Result<DuetConfig, ConfigError> {
    let config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &DuetConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
