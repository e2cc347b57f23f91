//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Duet Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[call]
# max_duration_secs = 600   # 10-3600, countdown starts once audio connects
# exit_grace_ms = 2000      # 500-10000, how long the end reason is shown
# ending_soon_secs = 30     # countdown turns urgent at or below this
# audio_mode = true         # start negotiating as soon as a match is bound
# announce_mute = true      # tell the partner about mute changes

[vad]
# silence_time_ms = 800     # 50-5000
# smoothing = 0.95          # 0.0-0.999
# sensitivity = 2.2         # 1.0-10.0
# window_size = 1024        # power of two, 32-32768

[audio]
# echo_cancellation = true
# noise_suppression = true
# auto_gain_control = true

# [[ice.servers]]
# urls = ["stun:stun.l.google.com:19302"]
#
# [[ice.servers]]
# urls = ["turn:openrelay.metered.ca:80"]
# username = "openrelayproject"
# credential = "openrelayproject"

[signaling]
# url = "ws://127.0.0.1:8080/ws"
# connect_timeout_secs = 15
# ping_interval_secs = 25
# reconnect_delay_secs = 1
# max_reconnect_delay_secs = 30

[logging]
# level = "info"            # trace, debug, info, warn, error
"##
    .to_string()
}
