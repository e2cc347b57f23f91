//! Subscriber bookkeeping shared by every signaling transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;
use tracing::trace;

use crate::protocol::{SignalKind, SignalMessage};

struct Subscriber {
    kinds: Vec<SignalKind>,
    tx: mpsc::UnboundedSender<SignalMessage>,
}

impl Subscriber {
    fn wants(&self, kind: SignalKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

type SubscriberMap = Mutex<HashMap<u64, Subscriber>>;

/// Registered handlers for incoming messages.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    subscribers: Arc<SubscriberMap>,
    next_id: Arc<AtomicU64>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kinds: &[SignalKind]) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).insert(
            id,
            Subscriber {
                kinds: kinds.to_vec(),
                tx,
            },
        );
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Deliver `message` to every interested subscriber. Returns how many
    /// received it.
    pub fn dispatch(&self, message: &SignalMessage) -> usize {
        let kind = message.kind();
        let mut map = lock(&self.subscribers);
        map.retain(|_, sub| !sub.tx.is_closed());
        let mut delivered = 0;
        for sub in map.values().filter(|s| s.wants(kind)) {
            if sub.tx.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }
        trace!(event = message.event_name(), delivered, "Signal dispatched");
        delivered
    }

    pub fn len(&self) -> usize {
        lock(&self.subscribers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A live registration. Dropping it unregisters the handler.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<SignalMessage>,
    registry: Weak<SubscriberMap>,
}

impl Subscription {
    /// Next message, or `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<SignalMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SignalMessage> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(map) = self.registry.upgrade() {
            lock(&map).remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

fn lock(map: &SubscriberMap) -> MutexGuard<'_, HashMap<u64, Subscriber>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
