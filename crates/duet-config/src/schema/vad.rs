//! Voice activity detection settings.

use serde::{Deserialize, Serialize};

/// Tuning for the speaking indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Silence must last this long before speaking is reported as stopped.
    pub silence_time_ms: u32,
    /// Noise floor smoothing factor (0.0-1.0, higher adapts slower).
    pub smoothing: f64,
    /// RMS must exceed `noise_floor * sensitivity` to count as speech.
    pub sensitivity: f64,
    /// Number of trailing samples analysed per frame (power of two).
    pub window_size: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            silence_time_ms: 800,
            smoothing: 0.95,
            sensitivity: 2.2,
            window_size: 1024,
        }
    }
}
