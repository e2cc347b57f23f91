//! Voice activity detection for the local microphone.
//!
//! [`VoiceActivityDetector`] is the pure frame-by-frame classifier;
//! [`VoiceActivityMonitor`] runs it against a live track and reports
//! debounced speaking edges.

mod detector;
mod monitor;

pub use detector::{VadConfig, VoiceActivityDetector};
pub use monitor::VoiceActivityMonitor;
