//! In-process relay used by the loopback mode and by tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::registry::{SubscriberRegistry, Subscription};
use super::SignalingChannel;
use crate::error::CallError;
use crate::protocol::{SignalKind, SignalMessage};

/// Builds connected pairs of in-memory signaling channels.
pub struct MemoryRelay;

impl MemoryRelay {
    /// Two channels where whatever one publishes, the other receives.
    pub fn pair() -> (MemorySignalingChannel, MemorySignalingChannel) {
        let a = SubscriberRegistry::new();
        let b = SubscriberRegistry::new();
        (
            MemorySignalingChannel::new(a.clone(), Some(b.clone())),
            MemorySignalingChannel::new(b, Some(a)),
        )
    }
}

/// One participant's end of an in-memory relay.
///
/// Published messages are recorded so callers can inspect what was sent.
#[derive(Clone)]
pub struct MemorySignalingChannel {
    local: SubscriberRegistry,
    peer: Option<SubscriberRegistry>,
    published: Arc<Mutex<Vec<SignalMessage>>>,
}

impl MemorySignalingChannel {
    fn new(local: SubscriberRegistry, peer: Option<SubscriberRegistry>) -> Self {
        Self {
            local,
            peer,
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A channel with nobody on the other end. Messages are only recorded.
    pub fn standalone() -> Self {
        Self::new(SubscriberRegistry::new(), None)
    }

    /// Deliver `message` to this side's subscribers as if it came from the
    /// relay. Returns how many subscribers received it.
    pub fn inject(&self, message: SignalMessage) -> usize {
        self.local.dispatch(&message)
    }

    pub fn published(&self) -> Vec<SignalMessage> {
        lock(&self.published).clone()
    }

    pub fn published_count(&self, kind: SignalKind) -> usize {
        lock(&self.published)
            .iter()
            .filter(|m| m.kind() == kind)
            .count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.local.len()
    }
}

#[async_trait]
impl SignalingChannel for MemorySignalingChannel {
    async fn publish(&self, message: SignalMessage) -> Result<(), CallError> {
        debug!(event = message.event_name(), "Publishing signal");
        lock(&self.published).push(message.clone());
        if let Some(peer) = &self.peer {
            peer.dispatch(&message);
        }
        Ok(())
    }

    fn subscribe(&self, kinds: &[SignalKind]) -> Subscription {
        self.local.subscribe(kinds)
    }
}

fn lock(log: &Mutex<Vec<SignalMessage>>) -> MutexGuard<'_, Vec<SignalMessage>> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
