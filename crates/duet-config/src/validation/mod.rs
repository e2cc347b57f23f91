//! Full configuration validation.
//!
//! Validates numeric ranges and server URLs. Each domain has its own
//! submodule; this orchestrator calls them all and collects errors into a
//! single `ConfigError`.

mod call;
mod helpers;
mod network;


use crate::schema::DuetConfig;
use duet_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &DuetConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    call::validate_call(&mut errors, config);
    call::validate_vad(&mut errors, config);
    network::validate_ice(&mut errors, config);
    network::validate_signaling(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
