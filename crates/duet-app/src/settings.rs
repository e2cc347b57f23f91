//! Maps the file configuration onto the call core's runtime types.

use std::time::Duration;

use duet_call::{AudioConstraints, ControllerConfig, IceServer, SessionSettings, WsSignalingConfig};
use duet_config::DuetConfig;

pub fn controller_config(config: &DuetConfig) -> ControllerConfig {
    let call = &config.call;
    ControllerConfig {
        max_duration: Duration::from_secs(call.max_duration_secs.into()),
        exit_grace: Duration::from_millis(call.exit_grace_ms.into()),
        ending_soon_secs: call.ending_soon_secs,
        audio_mode: call.audio_mode,
        announce_mute: call.announce_mute,
        vad: vad_config(config),
        session: session_settings(config),
    }
}

pub fn vad_config(config: &DuetConfig) -> duet_call::VadConfig {
    let vad = &config.vad;
    duet_call::VadConfig {
        silence_time: Duration::from_millis(vad.silence_time_ms.into()),
        smoothing: vad.smoothing as f32,
        sensitivity: vad.sensitivity as f32,
        window_size: vad.window_size as usize,
    }
}

pub fn session_settings(config: &DuetConfig) -> SessionSettings {
    let audio = &config.audio;
    SessionSettings {
        constraints: AudioConstraints {
            echo_cancellation: audio.echo_cancellation,
            noise_suppression: audio.noise_suppression,
            auto_gain_control: audio.auto_gain_control,
        },
        ice_servers: config
            .ice
            .servers
            .iter()
            .map(|server| IceServer {
                urls: server.urls.clone(),
                username: server.username.clone(),
                credential: server.credential.clone(),
            })
            .collect(),
    }
}

pub fn ws_config(config: &DuetConfig) -> WsSignalingConfig {
    let signaling = &config.signaling;
    WsSignalingConfig {
        url: signaling.url.clone(),
        connect_timeout: Duration::from_secs(signaling.connect_timeout_secs),
        ping_interval: Duration::from_secs(signaling.ping_interval_secs),
        reconnect_delay: Duration::from_secs(signaling.reconnect_delay_secs),
        max_reconnect_delay: Duration::from_secs(signaling.max_reconnect_delay_secs),
    }
}

/// Turn a `--log-level` value into a filter directive. Bare level names
/// apply to the duet crates only.
pub fn log_directive(level: &str) -> String {
    if level.contains('=') {
        level.to_string()
    } else {
        format!("duet={level},duet_call={level}")
    }
}
