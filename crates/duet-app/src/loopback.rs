//! Two controllers wired back to back over an in-process relay.

use std::sync::Arc;
use std::time::Duration;

use duet_call::{
    CallController, CallEvent, LoopbackDevices, LoopbackEndpointFactory, MemoryRelay, Role,
    TerminalReason,
};
use duet_common::{DuetError, MatchId};
use duet_config::DuetConfig;
use tracing::info;

use crate::events::{log_events, run_until_exit};
use crate::settings;

#[derive(Debug, Clone, Default)]
pub struct LoopbackOptions {
    pub duration_secs: Option<u32>,
    pub hangup_after: Option<u64>,
    pub deny_microphone: bool,
}

/// How each side's session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackReport {
    pub initiator: Option<TerminalReason>,
    pub responder: Option<TerminalReason>,
    pub endpoints: usize,
}

pub async fn run(
    config: &DuetConfig,
    options: LoopbackOptions,
) -> duet_common::Result<LoopbackReport> {
    let mut controller_config = settings::controller_config(config);
    if let Some(secs) = options.duration_secs {
        controller_config.max_duration = Duration::from_secs(secs.into());
    }
    let ending_soon_secs = controller_config.ending_soon_secs;

    let (initiator_channel, responder_channel) = MemoryRelay::pair();
    let endpoints = Arc::new(LoopbackEndpointFactory::new());

    let initiator_devices = LoopbackDevices::new().with_synthetic_voice();
    initiator_devices.set_denied(options.deny_microphone);
    let responder_devices = LoopbackDevices::new().with_synthetic_voice();

    let (initiator, initiator_events) = CallController::spawn(
        controller_config.clone(),
        Arc::new(initiator_channel),
        Arc::new(initiator_devices),
        endpoints.clone(),
    );
    let (responder, mut responder_events) = CallController::spawn(
        controller_config,
        Arc::new(responder_channel),
        Arc::new(responder_devices),
        endpoints.clone(),
    );

    let match_id = MatchId::generate();
    info!(%match_id, max_duration_secs = ?options.duration_secs, "Starting loopback call");

    // The responder must be listening before the offer goes out.
    responder.bind(match_id.clone(), Role::Responder).await;
    match responder_events.recv().await {
        Some(CallEvent::Bound { .. }) => {}
        _ => return Err(DuetError::Call("responder did not bind".into())),
    }
    initiator.bind(match_id, Role::Initiator).await;

    let initiator_log = tokio::spawn(log_events("initiator", initiator_events, ending_soon_secs));
    let responder_log = tokio::spawn(log_events("responder", responder_events, ending_soon_secs));
    let exits = async { tokio::join!(initiator_log, responder_log) };
    let (initiator_exit, responder_exit) =
        run_until_exit(&initiator, exits, options.hangup_after.map(Duration::from_secs)).await;

    let report = LoopbackReport {
        initiator: initiator_exit.map_err(|e| DuetError::Other(format!("initiator log: {e}")))?,
        responder: responder_exit.map_err(|e| DuetError::Other(format!("responder log: {e}")))?,
        endpoints: endpoints.created(),
    };
    info!(
        initiator = ?report.initiator,
        responder = ?report.responder,
        endpoints = report.endpoints,
        "Loopback call finished"
    );

    initiator.shutdown().await;
    responder.shutdown().await;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_timeout_or_partner_end(reason: Option<TerminalReason>) -> bool {
        matches!(
            reason,
            Some(TerminalReason::TimedOut) | Some(TerminalReason::PartnerEnded)
        )
    }

    #[tokio::test(start_paused = true)]
    async fn both_sides_exit_when_time_runs_out() {
        let options = LoopbackOptions {
            duration_secs: Some(3),
            ..Default::default()
        };
        let report = run(&DuetConfig::default(), options).await.unwrap();

        // Both timers run out together; either may notice first.
        assert!(is_timeout_or_partner_end(report.initiator));
        assert!(is_timeout_or_partner_end(report.responder));
        assert!(
            report.initiator == Some(TerminalReason::TimedOut)
                || report.responder == Some(TerminalReason::TimedOut)
        );
        assert_eq!(report.endpoints, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hangup_reaches_the_partner() {
        let options = LoopbackOptions {
            duration_secs: Some(60),
            hangup_after: Some(5),
            ..Default::default()
        };
        let report = run(&DuetConfig::default(), options).await.unwrap();

        assert_eq!(report.initiator, Some(TerminalReason::Hangup));
        assert_eq!(report.responder, Some(TerminalReason::PartnerEnded));
    }

    #[tokio::test(start_paused = true)]
    async fn denied_microphone_still_completes() {
        let options = LoopbackOptions {
            duration_secs: Some(2),
            deny_microphone: true,
            ..Default::default()
        };
        let report = run(&DuetConfig::default(), options).await.unwrap();

        assert!(is_timeout_or_partner_end(report.initiator));
        assert!(is_timeout_or_partner_end(report.responder));
    }
}
