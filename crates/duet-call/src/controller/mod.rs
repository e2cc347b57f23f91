//! Binds a session to the current match and owns its lifecycle.
//!
//! The controller runs as one background task. Commands, signaling,
//! endpoint discoveries, timer ticks and speaking edges are all handled on
//! that task in arrival order, so every teardown path goes through the same
//! guard and the first terminal reason wins.

mod event_loop;
mod handle;
mod types;

#[cfg(test)]
mod tests;

pub use handle::CallController;
pub use types::{CallEvent, CallStatus, ControllerConfig, TerminalReason};
