//! Configuration schema types for Duet.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod audio;
mod call;
mod ice;
mod signaling;
mod system;
mod vad;

pub use audio::*;
pub use call::*;
pub use ice::*;
pub use signaling::*;
pub use system::*;
pub use vad::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Duet.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct DuetConfig {
    pub call: CallConfig,
    pub vad: VadConfig,
    pub audio: AudioConfig,
    pub ice: IceConfig,
    pub signaling: SignalingConfig,
    pub logging: LoggingConfig,
}
