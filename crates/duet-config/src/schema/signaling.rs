use serde::{Deserialize, Serialize};

/// Connection settings for the signaling relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// WebSocket URL of the relay server.
    pub url: String,
    /// Give up on a connection attempt after this many seconds.
    pub connect_timeout_secs: u64,
    /// Interval between keep-alive pings.
    pub ping_interval_secs: u64,
    /// Reconnect base delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".into(),
            connect_timeout_secs: 15,
            ping_interval_secs: 25,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}
