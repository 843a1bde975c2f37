//! Clap derive structures for the `pentairhome` daemon.
//!
//! Every setting can also come from the environment (`PENTAIRHOME_*`) or the
//! settings file. The underscore spellings (`--mqtt_host`) are accepted as
//! aliases so existing service units keep working.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// pentairhome -- Pentair Home to Home Assistant bridge
#[derive(Debug, Parser)]
#[command(
    name = "pentairhome",
    version,
    about = "Publish Pentair IntelliConnect telemetry to MQTT for Home Assistant",
    long_about = "Logs in to the Pentair Home cloud, polls the account's IntelliConnect\n\
        controller and publishes its readings to an MQTT broker, together with\n\
        Home Assistant discovery configs."
)]
pub struct Cli {
    // ── Pentair Home account ─────────────────────────────────────────
    /// Pentair Home username (e-mail)
    #[arg(long, visible_alias = "pentairhome_username", env = "PENTAIRHOME_USERNAME")]
    pub username: Option<String>,

    /// Pentair Home password
    #[arg(
        long,
        visible_alias = "pentairhome_password",
        env = "PENTAIRHOME_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    // ── MQTT broker ──────────────────────────────────────────────────
    /// MQTT broker host
    #[arg(long, visible_alias = "mqtt_host", env = "PENTAIRHOME_MQTT_HOST")]
    pub mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(long, visible_alias = "mqtt_port", env = "PENTAIRHOME_MQTT_PORT")]
    pub mqtt_port: Option<u16>,

    /// MQTT username
    #[arg(long, visible_alias = "mqtt_username", env = "PENTAIRHOME_MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    /// MQTT password
    #[arg(
        long,
        visible_alias = "mqtt_password",
        env = "PENTAIRHOME_MQTT_PASSWORD",
        hide_env_values = true
    )]
    pub mqtt_password: Option<String>,

    /// MQTT client identifier [default: pentairhome]
    #[arg(long, env = "PENTAIRHOME_MQTT_CLIENT_ID")]
    pub mqtt_client_id: Option<String>,

    /// Home Assistant status topic; empty disables re-announcing
    /// [default: homeassistant/status]
    #[arg(long, env = "PENTAIRHOME_STATUS_TOPIC")]
    pub status_topic: Option<String>,

    /// Home Assistant discovery prefix [default: homeassistant]
    #[arg(long, env = "PENTAIRHOME_DISCOVERY_PREFIX")]
    pub discovery_prefix: Option<String>,

    /// Prefix of the telemetry topic [default: pentairhome]
    #[arg(long, env = "PENTAIRHOME_STATE_PREFIX")]
    pub state_prefix: Option<String>,

    // ── Polling ──────────────────────────────────────────────────────
    /// Seconds between device polls [default: 60]
    #[arg(long, env = "PENTAIRHOME_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Cloud request timeout in seconds [default: poll interval]
    #[arg(long, env = "PENTAIRHOME_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Model of the device to monitor [default: IntelliConnect]
    #[arg(long, env = "PENTAIRHOME_DEVICE_MODEL")]
    pub device_model: Option<String>,

    // ── Process ──────────────────────────────────────────────────────
    /// Settings file (TOML)
    #[arg(long, short = 'c', env = "PENTAIRHOME_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log in, fetch the monitored device, print a summary and exit
    #[arg(long)]
    pub check: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, env = "PENTAIRHOME_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}
