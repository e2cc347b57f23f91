//! Configuration and command types for the WebSocket transport.

use std::time::Duration;

use crate::protocol::SignalMessage;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WsSignalingConfig {
    /// Relay endpoint, `ws://` or `wss://`.
    pub url: String,
    pub connect_timeout: Duration,
    pub ping_interval: Duration,
    /// Reconnect base delay.
    pub reconnect_delay: Duration,
    /// Upper bound for the backoff.
    pub max_reconnect_delay: Duration,
}

impl Default for WsSignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            connect_timeout: Duration::from_secs(15),
            ping_interval: Duration::from_secs(25),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

impl WsSignalingConfig {
    pub(crate) fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_reconnect_delay)
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands sent from the handle to the connection task.
#[derive(Debug)]
pub(crate) enum WsCommand {
    Publish(SignalMessage),
    Disconnect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let config = WsSignalingConfig {
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(5),
            ..Default::default()
        };
        let mut delay = config.reconnect_delay;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(delay.as_secs());
            delay = config.next_delay(delay);
        }
        assert_eq!(seen, vec![1, 2, 4, 5, 5]);
    }
}
