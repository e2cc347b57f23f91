//! In-process stand-ins for the microphone and the peer connection.
//!
//! Used by `duet loopback` to run two controllers against each other, and by
//! the tests. Both keep counters so callers can check how the call core
//! drove them.

mod devices;
mod endpoint;

pub use devices::LoopbackDevices;
pub use endpoint::{EndpointRecord, LoopbackEndpointFactory};
