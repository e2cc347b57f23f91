//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_duet_config.toml"));
    assert!(matches!(
        result.unwrap_err(),
        duet_common::ConfigError::FileNotFound(_)
    ));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[call]
max_duration_secs = 120
announce_mute = false

[vad]
sensitivity = 3.0
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.call.max_duration_secs, 120);
    assert!(!config.call.announce_mute);
    assert!((config.vad.sensitivity - 3.0).abs() < f64::EPSILON);
    // Defaults preserved
    assert_eq!(config.call.exit_grace_ms, 2000);
    assert_eq!(config.vad.silence_time_ms, 800);
    assert!(config.audio.echo_cancellation);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, duet_common::ConfigError::ParseError(_)));
}

#[test]
fn unreadable_path_is_not_reported_as_missing() {
    let dir = tempfile::tempdir().unwrap();

    let err = load_from_path(dir.path()).unwrap_err();
    assert!(matches!(err, duet_common::ConfigError::ParseError(_)));
    assert!(err.to_string().contains("failed to read"));
}

#[test]
fn load_config_with_invalid_values_still_returns_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[call]\nmax_duration_secs = 5\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.call.max_duration_secs, 5);
}

#[test]
fn load_custom_ice_servers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[[ice.servers]]
urls = ["stun:stun.example.org:3478"]
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.ice.servers.len(), 1);
    assert_eq!(config.ice.servers[0].urls[0], "stun:stun.example.org:3478");
    assert!(config.ice.servers[0].username.is_none());
}

#[test]
fn load_log_level() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.logging.level, crate::schema::LogLevel::Debug);
}

#[test]
fn create_default_config_writes_parseable_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.call.max_duration_secs, 600);
    assert_eq!(config.ice.servers.len(), 2);
}

#[test]
fn default_config_path_ends_with_duet_config() {
    if let Ok(path) = default_config_path() {
        assert!(path.ends_with("duet/config.toml"));
    }
}
