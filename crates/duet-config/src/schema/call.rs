//! Call lifecycle settings.

use serde::{Deserialize, Serialize};

/// Call duration, exit grace window, and start-up behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Maximum call length in seconds once the audio path is connected.
    pub max_duration_secs: u32,
    /// How long a terminal reason stays visible before the session exits.
    /// At least 500; 2000 unless overridden.
    pub exit_grace_ms: u32,
    /// Remaining seconds at or below which the countdown is shown as ending soon.
    pub ending_soon_secs: u32,
    /// Start audio negotiation as soon as a match is bound.
    pub audio_mode: bool,
    /// Tell the partner when the local microphone is muted or unmuted.
    pub announce_mute: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 600,
            exit_grace_ms: 2000,
            ending_soon_secs: 30,
            audio_mode: true,
            announce_mute: true,
        }
    }
}
