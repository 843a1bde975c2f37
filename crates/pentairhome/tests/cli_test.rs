//! Integration tests for the `pentairhome` binary.
//!
//! Everything here fails (or succeeds) before any network activity:
//! argument parsing, settings layering and validation.
#![allow(clippy::unwrap_used)]

use std::io::Write as _;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const ENV_VARS: [&str; 16] = [
    "PENTAIRHOME_USERNAME",
    "PENTAIRHOME_PASSWORD",
    "PENTAIRHOME_MQTT_HOST",
    "PENTAIRHOME_MQTT_PORT",
    "PENTAIRHOME_MQTT_USERNAME",
    "PENTAIRHOME_MQTT_PASSWORD",
    "PENTAIRHOME_MQTT_CLIENT_ID",
    "PENTAIRHOME_STATUS_TOPIC",
    "PENTAIRHOME_DISCOVERY_PREFIX",
    "PENTAIRHOME_STATE_PREFIX",
    "PENTAIRHOME_POLL_INTERVAL",
    "PENTAIRHOME_REQUEST_TIMEOUT",
    "PENTAIRHOME_DEVICE_MODEL",
    "PENTAIRHOME_CONFIG",
    "PENTAIRHOME_LOG_FORMAT",
    "RUST_LOG",
];

/// The binary with a clean environment and no reachable settings file.
fn pentairhome_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pentairhome");
    cmd.env("HOME", "/tmp/pentairhome-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/pentairhome-test-nonexistent");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn settings_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_lists_settings() {
    pentairhome_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("IntelliConnect")
            .and(predicate::str::contains("--mqtt-host"))
            .and(predicate::str::contains("--poll-interval"))
            .and(predicate::str::contains("--check")),
    );
}

#[test]
fn test_version_flag() {
    pentairhome_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pentairhome"));
}

#[test]
fn test_unknown_log_format_is_usage_error() {
    pentairhome_cmd()
        .args(["--log-format", "xml"])
        .assert()
        .code(2);
}

// ── Required settings ───────────────────────────────────────────────

#[test]
fn test_every_missing_setting_is_reported() {
    pentairhome_cmd().assert().code(2).stderr(
        predicate::str::contains("username is required")
            .and(predicate::str::contains("password is required"))
            .and(predicate::str::contains("mqtt_host is required"))
            .and(predicate::str::contains("mqtt_port is required"))
            .and(predicate::str::contains("mqtt_username is required"))
            .and(predicate::str::contains("mqtt_password is required")),
    );
}

#[test]
fn test_underscore_flags_are_accepted() {
    pentairhome_cmd()
        .args([
            "--pentairhome_username=pool@example.com",
            "--pentairhome_password=hunter2",
            "--mqtt_host=broker.local",
            "--mqtt_port=1883",
            "--mqtt_username=ha",
        ])
        .assert()
        .code(2)
        .stderr(
            predicate::str::contains("mqtt_password is required")
                .and(predicate::str::contains("username is required").not()),
        );
}

#[test]
fn test_environment_supplies_settings() {
    pentairhome_cmd()
        .env("PENTAIRHOME_USERNAME", "pool@example.com")
        .env("PENTAIRHOME_PASSWORD", "hunter2")
        .assert()
        .code(2)
        .stderr(
            predicate::str::contains("mqtt_host is required")
                .and(predicate::str::contains("PENTAIRHOME_USERNAME").not()),
        );
}

#[test]
fn test_check_mode_does_not_require_broker() {
    pentairhome_cmd()
        .args(["--check", "--username", "pool@example.com"])
        .assert()
        .code(2)
        .stderr(
            predicate::str::contains("password is required")
                .and(predicate::str::contains("mqtt_host").not()),
        );
}

// ── Settings file ───────────────────────────────────────────────────

#[test]
fn test_missing_settings_file_is_rejected() {
    pentairhome_cmd()
        .args(["--config", "/nonexistent.toml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_invalid_settings_file_is_rejected() {
    let file = settings_file("mqtt_port = \"not a port\"\n");

    pentairhome_cmd()
        .arg("--config")
        .arg(file.path())
        .assert()
        .code(2);
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    let file = settings_file(
        r#"
username = "pool@example.com"
password = "hunter2"
mqtt_host = "broker.local"
mqtt_port = 1883
mqtt_username = "ha"
mqtt_password = "mqtt-secret"
poll_interval = 0
"#,
    );

    pentairhome_cmd()
        .arg("--config")
        .arg(file.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("poll_interval"));
}
