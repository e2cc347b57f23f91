//! WebSocket signaling transport.
//!
//! Connects to a relay that forwards `{"event", "payload"}` frames between
//! the two participants of a match. Keeps the connection alive with pings
//! and reconnects with exponential backoff. Messages published while the
//! socket is down are held and flushed on reconnect.

mod client;
mod connection;
mod types;

pub use client::WsSignalingChannel;
pub use types::WsSignalingConfig;
