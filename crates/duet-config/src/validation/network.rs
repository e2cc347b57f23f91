//! Validation for ICE servers and the signaling relay.

use crate::schema::DuetConfig;

use super::helpers::validate_range_u64;

const ICE_SCHEMES: &[&str] = &["stun:", "stuns:", "turn:", "turns:"];

/// Every ICE server needs at least one URL with a STUN/TURN scheme, and
/// TURN servers need credentials.
pub(crate) fn validate_ice(errors: &mut Vec<String>, config: &DuetConfig) {
    for (i, server) in config.ice.servers.iter().enumerate() {
        if server.urls.is_empty() {
            errors.push(format!("ice.servers[{i}].urls must not be empty"));
        }
        for url in &server.urls {
            if !ICE_SCHEMES.iter().any(|s| url.starts_with(s)) {
                errors.push(format!(
                    "ice.servers[{i}] url '{url}' must start with stun:, stuns:, turn: or turns:"
                ));
            }
            if url.starts_with("turn") && (server.username.is_none() || server.credential.is_none())
            {
                errors.push(format!(
                    "ice.servers[{i}] url '{url}' requires username and credential"
                ));
            }
        }
    }
}

/// Validate relay connection settings.
pub(crate) fn validate_signaling(errors: &mut Vec<String>, config: &DuetConfig) {
    let signaling = &config.signaling;
    if !(signaling.url.starts_with("ws://") || signaling.url.starts_with("wss://")) {
        errors.push(format!(
            "signaling.url '{}' must start with ws:// or wss://",
            signaling.url
        ));
    }
    validate_range_u64(
        errors,
        "signaling.connect_timeout_secs",
        signaling.connect_timeout_secs,
        1,
        120,
    );
    validate_range_u64(
        errors,
        "signaling.ping_interval_secs",
        signaling.ping_interval_secs,
        1,
        300,
    );
    validate_range_u64(
        errors,
        "signaling.reconnect_delay_secs",
        signaling.reconnect_delay_secs,
        1,
        signaling.max_reconnect_delay_secs.max(1),
    );
    validate_range_u64(
        errors,
        "signaling.max_reconnect_delay_secs",
        signaling.max_reconnect_delay_secs,
        1,
        600,
    );
}
