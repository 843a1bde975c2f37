// ── Core error types ──
//
// Bridge-level errors. Consumers never see Cognito error bodies or HTTP
// status codes directly: the `From<pentair_api::Error>` impl folds
// transport-layer failures into the categories the bridge reacts to.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Cloud errors ─────────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cloud request failed: {message}")]
    Request {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Cloud request timed out")]
    Timeout,

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("No device with model {model:?} on this account")]
    NoMonitoredDevice { model: String },

    // ── Telemetry errors ─────────────────────────────────────────────
    #[error("Cannot read field {field} ({metric}) from device: {reason}")]
    FieldExtraction {
        metric: &'static str,
        field: &'static str,
        reason: String,
    },

    // ── Broker errors ────────────────────────────────────────────────
    #[error("Cannot connect to MQTT broker at {address}: {reason}")]
    BrokerConnect { address: String, reason: String },

    #[error("Publishing to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pentair_api::Error> for CoreError {
    fn from(err: pentair_api::Error) -> Self {
        match err {
            pentair_api::Error::Authentication { message }
            | pentair_api::Error::CredentialExchange { message } => {
                CoreError::AuthenticationFailed { message }
            }
            pentair_api::Error::UnexpectedChallenge { challenge } => {
                CoreError::AuthenticationFailed {
                    message: format!("Cognito requested unsupported challenge {challenge}"),
                }
            }
            ref err @ pentair_api::Error::Cognito {
                ref kind,
                ref message,
            } => {
                let message = format!("{kind}: {message}");
                if err.is_auth_failure() {
                    CoreError::AuthenticationFailed { message }
                } else {
                    CoreError::Request {
                        message,
                        status: None,
                    }
                }
            }
            pentair_api::Error::Signing { message } => CoreError::Request {
                message: format!("request signing failed: {message}"),
                status: None,
            },
            pentair_api::Error::Transport(ref e) if e.is_timeout() => CoreError::Timeout,
            pentair_api::Error::Transport(e) => CoreError::Request {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            pentair_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            pentair_api::Error::Api { status, body } => CoreError::Request {
                message: format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()),
                status: Some(status),
            },
            pentair_api::Error::DeviceNotFound { device_id } => CoreError::DeviceNotFound {
                identifier: device_id,
            },
            pentair_api::Error::Deserialization { message, body: _ } => CoreError::Request {
                message: format!("unexpected response: {message}"),
                status: None,
            },
            pentair_api::Error::Serialization(e) => {
                CoreError::Internal(format!("Serialization error: {e}"))
            }
        }
    }
}
