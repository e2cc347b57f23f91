//! Validation for the call and voice activity sections.

use crate::schema::DuetConfig;

use super::helpers::{validate_range, validate_range_f64};

/// Validate call lifecycle constraints.
pub(crate) fn validate_call(errors: &mut Vec<String>, config: &DuetConfig) {
    validate_range(
        errors,
        "call.max_duration_secs",
        config.call.max_duration_secs,
        10,
        3600,
    );
    validate_range(errors, "call.exit_grace_ms", config.call.exit_grace_ms, 500, 10_000);
    validate_range(
        errors,
        "call.ending_soon_secs",
        config.call.ending_soon_secs,
        0,
        config.call.max_duration_secs,
    );
}

/// Validate voice activity detection constraints.
pub(crate) fn validate_vad(errors: &mut Vec<String>, config: &DuetConfig) {
    validate_range(
        errors,
        "vad.silence_time_ms",
        config.vad.silence_time_ms,
        50,
        5000,
    );
    validate_range_f64(errors, "vad.smoothing", config.vad.smoothing, 0.0, 0.999);
    validate_range_f64(errors, "vad.sensitivity", config.vad.sensitivity, 1.0, 10.0);
    validate_range(errors, "vad.window_size", config.vad.window_size, 32, 32_768);
    if !config.vad.window_size.is_power_of_two() {
        errors.push(format!(
            "vad.window_size = {} must be a power of two",
            config.vad.window_size
        ));
    }
}
