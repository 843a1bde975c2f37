//! Daemon error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help
//! text and a stable process exit code.

use miette::Diagnostic;
use thiserror::Error;

use pentair_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

/// One required setting that no layer provided.
#[derive(Debug, Error, Diagnostic)]
#[error("{key} is required")]
#[diagnostic(
    code(pentairhome::missing_setting),
    help("Pass --{flag}, set {env}, or add `{key}` to the settings file.")
)]
pub struct MissingSetting {
    pub key: &'static str,
    pub flag: &'static str,
    pub env: &'static str,
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Missing required settings")]
    #[diagnostic(code(pentairhome::missing_settings), help("Run: pentairhome --help"))]
    MissingSettings {
        #[related]
        missing: Vec<MissingSetting>,
    },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pentairhome::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(pentairhome::config))]
    Config(Box<figment::Error>),

    // ── Pentair cloud ────────────────────────────────────────────────
    #[error("Pentair Home login failed: {message}")]
    #[diagnostic(
        code(pentairhome::auth_failed),
        help("Check the username and password you use in the Pentair Home app.")
    )]
    AuthFailed { message: String },

    #[error("No {model} device on this Pentair Home account")]
    #[diagnostic(
        code(pentairhome::no_device),
        help("Add the controller in the Pentair Home app, or pick another --device-model.")
    )]
    NoDevice { model: String },

    #[error("Device '{identifier}' not found")]
    #[diagnostic(code(pentairhome::not_found))]
    NotFound { identifier: String },

    #[error("Pentair cloud request failed: {message}")]
    #[diagnostic(code(pentairhome::cloud_request))]
    CloudRequest { message: String },

    #[error("Pentair cloud request timed out")]
    #[diagnostic(
        code(pentairhome::timeout),
        help("Raise --request-timeout if the connection is slow.")
    )]
    Timeout,

    #[error("Cannot read device telemetry: {message}")]
    #[diagnostic(code(pentairhome::telemetry))]
    Telemetry { message: String },

    // ── MQTT ─────────────────────────────────────────────────────────
    #[error("Could not connect to MQTT broker at {address}")]
    #[diagnostic(
        code(pentairhome::broker_connect),
        help("{reason}\nCheck --mqtt-host, --mqtt-port and the MQTT credentials.")
    )]
    BrokerConnect { address: String, reason: String },

    #[error("MQTT connection to {address} closed")]
    #[diagnostic(code(pentairhome::broker_closed))]
    BrokerClosed { address: String },

    #[error("Publishing to {topic} failed: {reason}")]
    #[diagnostic(code(pentairhome::publish))]
    Publish { topic: String, reason: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(pentairhome::internal))]
    Internal(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingSettings { .. } | Self::Validation { .. } | Self::Config(_) => {
                exit_code::USAGE
            }
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NoDevice { .. } | Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::CloudRequest { .. }
            | Self::BrokerConnect { .. }
            | Self::BrokerClosed { .. }
            | Self::Publish { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Telemetry { .. } | Self::Internal(_) => exit_code::GENERAL,
        }
    }
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        CliError::Config(Box::new(err))
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Request { message, .. } => CliError::CloudRequest { message },
            CoreError::Timeout => CliError::Timeout,
            CoreError::DeviceNotFound { identifier } => CliError::NotFound { identifier },
            CoreError::NoMonitoredDevice { model } => CliError::NoDevice { model },
            err @ CoreError::FieldExtraction { .. } => CliError::Telemetry {
                message: err.to_string(),
            },
            CoreError::BrokerConnect { address, reason } => {
                CliError::BrokerConnect { address, reason }
            }
            CoreError::Publish { topic, reason } => CliError::Publish { topic, reason },
            CoreError::Config { message } => CliError::Validation {
                field: "settings".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
