//! The match-scoped signaling bus.
//!
//! The call core only needs two things from the relay: publish a message to
//! the partner, and receive the partner's messages. Handlers subscribe for
//! the kinds they care about and get a [`Subscription`] that unregisters
//! itself when dropped, so a disposed session can never be called back.

mod memory;
mod registry;
pub mod ws;

use async_trait::async_trait;

use crate::error::CallError;
use crate::protocol::{SignalKind, SignalMessage};

pub use memory::{MemoryRelay, MemorySignalingChannel};
pub use registry::{SubscriberRegistry, Subscription};
pub use ws::{WsSignalingChannel, WsSignalingConfig};

#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Send a message to the other participant of the match.
    async fn publish(&self, message: SignalMessage) -> Result<(), CallError>;

    /// Receive incoming messages of the given kinds (all kinds when empty).
    fn subscribe(&self, kinds: &[SignalKind]) -> Subscription;
}
