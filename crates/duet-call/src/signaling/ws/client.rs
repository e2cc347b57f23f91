//! Public handle for the WebSocket signaling connection.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use super::connection::connection_loop;
use super::types::{WsCommand, WsSignalingConfig};
use crate::error::CallError;
use crate::protocol::{SignalKind, SignalMessage};
use crate::signaling::{SignalingChannel, SubscriberRegistry, Subscription};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle to the background relay connection.
///
/// Publishing never blocks on the network; messages are queued for the
/// connection task, which sends them in order.
#[derive(Clone)]
pub struct WsSignalingChannel {
    command_tx: mpsc::UnboundedSender<WsCommand>,
    registry: SubscriberRegistry,
    connected: Arc<RwLock<bool>>,
}

impl WsSignalingChannel {
    /// Start the background connection. Must be called inside a runtime.
    pub fn connect(config: WsSignalingConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let registry = SubscriberRegistry::new();
        let connected = Arc::new(RwLock::new(false));

        tokio::spawn(connection_loop(
            config,
            Arc::clone(&connected),
            registry.clone(),
            command_rx,
        ));

        Self {
            command_tx,
            registry,
            connected,
        }
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Close the socket and stop reconnecting.
    pub fn disconnect(&self) {
        let _ = self.command_tx.send(WsCommand::Disconnect);
    }
}

#[async_trait]
impl SignalingChannel for WsSignalingChannel {
    async fn publish(&self, message: SignalMessage) -> Result<(), CallError> {
        self.command_tx
            .send(WsCommand::Publish(message))
            .map_err(|_| CallError::ChannelClosed)
    }

    fn subscribe(&self, kinds: &[SignalKind]) -> Subscription {
        self.registry.subscribe(kinds)
    }
}
