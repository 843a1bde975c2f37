// ── Runtime bridge configuration ──
//
// These types describe *what* to bridge and *where* to publish it. They
// carry credential data and tuning, but never touch disk: the binary
// layers flags, environment and settings file, then hands a finished
// `BridgeConfig` in.

use std::time::Duration;

use pentair_api::CognitoConfig;
use secrecy::SecretString;
use url::Url;

/// Model string that marks the device to monitor.
pub const INTELLICONNECT_MODEL: &str = "IntelliConnect";

/// Pentair Home account credentials.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub username: String,
    pub password: SecretString,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Home Assistant birth topic to follow. `None` disables the listener.
    pub status_topic: Option<String>,
    /// How long `connect` waits for the first CONNACK.
    pub connect_timeout: Duration,
    /// Pause between reconnect attempts after the link drops.
    pub reconnect_delay: Duration,
}

impl BrokerConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password,
            client_id: "pentairhome".into(),
            keep_alive: Duration::from_secs(30),
            status_topic: Some("homeassistant/status".into()),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
        }
    }

    /// `host:port`, for diagnostics.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Everything the bridge needs to run.
///
/// Built by the binary, passed to `Bridge` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub account: AccountCredentials,
    pub cognito: CognitoConfig,
    /// Pentair cloud API root.
    pub api_base_url: Url,
    /// Time between device polls.
    pub poll_interval: Duration,
    /// Per-request deadline for cloud calls.
    pub request_timeout: Duration,
    /// Telemetry is published to `<state_topic_prefix>/<deviceId>`.
    pub state_topic_prefix: String,
    /// Discovery configs go to `<discovery_prefix>/sensor/<uniqueId>/config`.
    pub discovery_prefix: String,
    /// Listed devices are matched against this model.
    pub device_model: String,
}

impl BridgeConfig {
    /// Production defaults for everything except the account.
    pub fn new(account: AccountCredentials) -> Self {
        let poll_interval = Duration::from_secs(60);
        Self {
            account,
            cognito: CognitoConfig::default(),
            api_base_url: Url::parse(pentair_api::client::DEFAULT_BASE_URL)
                .expect("default API URL is valid"),
            poll_interval,
            request_timeout: poll_interval,
            state_topic_prefix: "pentairhome".into(),
            discovery_prefix: "homeassistant".into(),
            device_model: INTELLICONNECT_MODEL.into(),
        }
    }
}
