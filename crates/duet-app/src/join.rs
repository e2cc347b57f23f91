//! Join a match over the WebSocket relay.
//!
//! Media runs through the loopback endpoint; the relay, the negotiation
//! flow and the lifecycle are real.

use std::sync::Arc;
use std::time::Duration;

use duet_call::{CallController, LoopbackDevices, LoopbackEndpointFactory, Role, WsSignalingChannel};
use duet_common::{ConfigError, DuetError, MatchId};
use duet_config::DuetConfig;
use tracing::info;

use crate::events::{log_events, run_until_exit};
use crate::settings;

#[derive(Debug, Clone)]
pub struct JoinOptions {
    pub match_id: String,
    pub role: Role,
    pub url: Option<String>,
    pub hangup_after: Option<u64>,
}

pub async fn run(config: &DuetConfig, options: JoinOptions) -> duet_common::Result<()> {
    if options.match_id.trim().is_empty() {
        return Err(DuetError::Other("match id must not be empty".into()));
    }

    let mut ws_config = settings::ws_config(config);
    if let Some(url) = options.url {
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            return Err(ConfigError::ValidationError(format!(
                "relay url must start with ws:// or wss://, got '{url}'"
            ))
            .into());
        }
        ws_config.url = url;
    }
    info!(url = %ws_config.url, "Connecting to relay");

    let signaling = WsSignalingChannel::connect(ws_config);
    let controller_config = settings::controller_config(config);
    let ending_soon_secs = controller_config.ending_soon_secs;
    let (controller, events) = CallController::spawn(
        controller_config,
        Arc::new(signaling.clone()),
        Arc::new(LoopbackDevices::new().with_synthetic_voice()),
        Arc::new(LoopbackEndpointFactory::new()),
    );

    controller
        .bind(MatchId::new(options.match_id.trim()), options.role)
        .await;

    let exit = log_events("local", events, ending_soon_secs);
    run_until_exit(&controller, exit, options.hangup_after.map(Duration::from_secs)).await;

    let status = controller.status().await;
    info!(
        reason = ?status.terminal_reason,
        remaining = %status.remaining_display(),
        "Call finished"
    );

    controller.shutdown().await;
    signaling.disconnect();
    Ok(())
}
