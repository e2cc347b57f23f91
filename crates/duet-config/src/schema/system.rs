//! Logging configuration.

use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `tracing_subscriber` filter directive scoped to the duet crates.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "duet=trace,duet_call=trace",
            LogLevel::Debug => "duet=debug,duet_call=debug",
            LogLevel::Info => "duet=info,duet_call=info",
            LogLevel::Warn => "duet=warn,duet_call=warn",
            LogLevel::Error => "duet=error,duet_call=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
