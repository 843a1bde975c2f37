//! Daemon-owned settings: TOML file + flags/environment, resolved into the
//! core's `BridgeConfig` and `BrokerConfig`.
//!
//! Core never sees these types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use pentair_api::CognitoConfig;
use pentair_core::{AccountCredentials, BridgeConfig, BrokerConfig, INTELLICONNECT_MODEL};

use crate::cli::Cli;
use crate::error::{CliError, MissingSetting};

// ── Settings ─────────────────────────────────────────────────────────

/// Everything configurable, after layering. `None` means no layer set it.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub username: Option<String>,
    pub password: Option<String>,
    pub mqtt_host: Option<String>,
    pub mqtt_port: Option<u16>,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,
    /// Empty disables the status listener.
    pub status_topic: String,
    pub discovery_prefix: String,
    pub state_prefix: String,
    /// Seconds.
    pub poll_interval: u64,
    /// Seconds; the poll interval when unset.
    pub request_timeout: Option<u64>,
    pub device_model: String,
    pub api_base_url: Option<Url>,
    pub cognito: CognitoConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            mqtt_host: None,
            mqtt_port: None,
            mqtt_username: None,
            mqtt_password: None,
            mqtt_client_id: "pentairhome".into(),
            status_topic: "homeassistant/status".into(),
            discovery_prefix: "homeassistant".into(),
            state_prefix: "pentairhome".into(),
            poll_interval: 60,
            request_timeout: None,
            device_model: INTELLICONNECT_MODEL.into(),
            api_base_url: None,
            cognito: CognitoConfig::default(),
        }
    }
}

/// Values given on the command line or through `PENTAIRHOME_*`. Only the
/// ones actually present are serialized, so they override the file
/// key by key.
#[derive(Default, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mqtt_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mqtt_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mqtt_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mqtt_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mqtt_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    discovery_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    poll_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_model: Option<String>,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Self {
            username: cli.username.clone(),
            password: cli.password.clone(),
            mqtt_host: cli.mqtt_host.clone(),
            mqtt_port: cli.mqtt_port,
            mqtt_username: cli.mqtt_username.clone(),
            mqtt_password: cli.mqtt_password.clone(),
            mqtt_client_id: cli.mqtt_client_id.clone(),
            status_topic: cli.status_topic.clone(),
            discovery_prefix: cli.discovery_prefix.clone(),
            state_prefix: cli.state_prefix.clone(),
            poll_interval: cli.poll_interval,
            request_timeout: cli.request_timeout,
            device_model: cli.device_model.clone(),
        }
    }
}

// ── Settings file path ───────────────────────────────────────────────

/// Default settings file location via XDG / platform conventions.
pub fn default_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "pentairhome").map(|dirs| dirs.config_dir().join("config.toml"))
}

// ── Loading ──────────────────────────────────────────────────────────

/// Layer defaults, the settings file and the command line.
///
/// clap already folds `PENTAIRHOME_*` variables into the flags, so the last
/// layer covers both. An explicit `--config` must exist; the default
/// location is optional.
pub fn load(cli: &Cli) -> Result<Settings, CliError> {
    let file = match &cli.config {
        Some(path) if !path.is_file() => {
            return Err(CliError::Validation {
                field: "config".into(),
                reason: format!("{} does not exist", path.display()),
            });
        }
        Some(path) => Some(path.clone()),
        None => default_settings_path(),
    };

    load_from(file.as_deref(), Overrides::from(cli))
}

fn load_from(file: Option<&Path>, overrides: Overrides) -> Result<Settings, CliError> {
    let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
    if let Some(path) = file {
        tracing::debug!(path = %path.display(), "reading settings file");
        figment = figment.merge(Toml::file(path));
    }
    let settings: Settings = figment.merge(Serialized::defaults(overrides)).extract()?;
    Ok(settings)
}

// ── Resolution ───────────────────────────────────────────────────────

/// Validated settings, split the way core consumes them.
#[derive(Debug)]
pub struct Runtime {
    pub bridge: BridgeConfig,
    /// `None` only in `--check` mode.
    pub broker: Option<BrokerConfig>,
}

impl Settings {
    /// Check required values and build the core configs.
    ///
    /// Every missing value is reported at once. With `check_only` the
    /// broker settings are optional.
    pub fn resolve(self, check_only: bool) -> Result<Runtime, CliError> {
        let mut missing = Vec::new();
        let mut require = |value: &Option<String>, key, flag, env| {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                missing.push(MissingSetting { key, flag, env });
            }
        };

        require(&self.username, "username", "username", "PENTAIRHOME_USERNAME");
        require(&self.password, "password", "password", "PENTAIRHOME_PASSWORD");
        if !check_only {
            require(&self.mqtt_host, "mqtt_host", "mqtt-host", "PENTAIRHOME_MQTT_HOST");
            require(
                &self.mqtt_username,
                "mqtt_username",
                "mqtt-username",
                "PENTAIRHOME_MQTT_USERNAME",
            );
            require(
                &self.mqtt_password,
                "mqtt_password",
                "mqtt-password",
                "PENTAIRHOME_MQTT_PASSWORD",
            );
            if self.mqtt_port.is_none() {
                missing.push(MissingSetting {
                    key: "mqtt_port",
                    flag: "mqtt-port",
                    env: "PENTAIRHOME_MQTT_PORT",
                });
            }
        }
        if !missing.is_empty() {
            return Err(CliError::MissingSettings { missing });
        }

        if self.poll_interval == 0 {
            return Err(CliError::Validation {
                field: "poll_interval".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if self.request_timeout == Some(0) {
            return Err(CliError::Validation {
                field: "request_timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }

        let broker = self.broker_config()?;
        let bridge = self.bridge_config();
        Ok(Runtime { bridge, broker })
    }

    fn bridge_config(self) -> BridgeConfig {
        let poll_interval = Duration::from_secs(self.poll_interval);
        let mut config = BridgeConfig::new(AccountCredentials {
            username: self.username.unwrap_or_default(),
            password: SecretString::from(self.password.unwrap_or_default()),
        });

        config.cognito = self.cognito;
        if let Some(url) = self.api_base_url {
            config.api_base_url = url;
        }
        config.poll_interval = poll_interval;
        config.request_timeout = self
            .request_timeout
            .map_or(poll_interval, Duration::from_secs);
        config.state_topic_prefix = self.state_prefix;
        config.discovery_prefix = self.discovery_prefix;
        config.device_model = self.device_model;
        config
    }

    fn broker_config(&self) -> Result<Option<BrokerConfig>, CliError> {
        let (Some(host), Some(port), Some(username), Some(password)) = (
            &self.mqtt_host,
            self.mqtt_port,
            &self.mqtt_username,
            &self.mqtt_password,
        ) else {
            return Ok(None);
        };

        if self.mqtt_client_id.trim().is_empty() {
            return Err(CliError::Validation {
                field: "mqtt_client_id".into(),
                reason: "must not be empty".into(),
            });
        }

        let mut config = BrokerConfig::new(
            host.as_str(),
            port,
            username.as_str(),
            SecretString::from(password.clone()),
        );
        config.client_id.clone_from(&self.mqtt_client_id);
        config.status_topic = Some(self.status_topic.clone()).filter(|topic| !topic.is_empty());
        Ok(Some(config))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write as _;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn complete() -> Overrides {
        Overrides {
            username: Some("pool@example.com".into()),
            password: Some("hunter2".into()),
            mqtt_host: Some("broker.local".into()),
            mqtt_port: Some(1883),
            mqtt_username: Some("ha".into()),
            mqtt_password: Some("mqtt-secret".into()),
            ..Overrides::default()
        }
    }

    fn missing_keys(err: &CliError) -> Vec<&'static str> {
        match err {
            CliError::MissingSettings { missing } => missing.iter().map(|m| m.key).collect(),
            other => panic!("expected MissingSettings, got: {other:?}"),
        }
    }

    #[test]
    fn defaults_match_production() {
        let runtime = load_from(None, complete()).unwrap().resolve(false).unwrap();

        assert_eq!(runtime.bridge.poll_interval, Duration::from_secs(60));
        assert_eq!(runtime.bridge.request_timeout, Duration::from_secs(60));
        assert_eq!(runtime.bridge.state_topic_prefix, "pentairhome");
        assert_eq!(runtime.bridge.discovery_prefix, "homeassistant");
        assert_eq!(runtime.bridge.device_model, "IntelliConnect");
        assert_eq!(runtime.bridge.account.password.expose_secret(), "hunter2");

        let broker = runtime.broker.unwrap();
        assert_eq!(broker.address(), "broker.local:1883");
        assert_eq!(broker.client_id, "pentairhome");
        assert_eq!(broker.status_topic.as_deref(), Some("homeassistant/status"));
    }

    #[test]
    fn every_missing_value_is_reported() {
        let err = load_from(None, Overrides::default())
            .unwrap()
            .resolve(false)
            .unwrap_err();

        assert_eq!(
            missing_keys(&err),
            vec![
                "username",
                "password",
                "mqtt_host",
                "mqtt_username",
                "mqtt_password",
                "mqtt_port",
            ]
        );
    }

    #[test]
    fn each_required_value_is_checked_on_its_own() {
        let cases: [(&str, fn(&mut Overrides)); 6] = [
            ("username", |o| o.username = None),
            ("password", |o| o.password = None),
            ("mqtt_host", |o| o.mqtt_host = None),
            ("mqtt_port", |o| o.mqtt_port = None),
            ("mqtt_username", |o| o.mqtt_username = None),
            ("mqtt_password", |o| o.mqtt_password = Some(String::new())),
        ];

        for (key, clear) in cases {
            let mut overrides = complete();
            clear(&mut overrides);
            let err = load_from(None, overrides).unwrap().resolve(false).unwrap_err();
            assert_eq!(missing_keys(&err), vec![key]);
        }
    }

    #[test]
    fn check_mode_needs_only_the_account() {
        let overrides = Overrides {
            username: Some("pool@example.com".into()),
            password: Some("hunter2".into()),
            ..Overrides::default()
        };

        let runtime = load_from(None, overrides).unwrap().resolve(true).unwrap();
        assert!(runtime.broker.is_none());
    }

    #[test]
    fn settings_file_is_overridden_by_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
username = "from-file"
password = "file-secret"
mqtt_host = "file-broker"
mqtt_port = 8883
mqtt_username = "ha"
mqtt_password = "mqtt-secret"
poll_interval = 30
status_topic = ""

[cognito]
region = "eu-west-1"
"#
        )
        .unwrap();

        let overrides = Overrides {
            username: Some("from-flag".into()),
            ..Overrides::default()
        };
        let runtime = load_from(Some(file.path()), overrides)
            .unwrap()
            .resolve(false)
            .unwrap();

        assert_eq!(runtime.bridge.account.username, "from-flag");
        assert_eq!(runtime.bridge.poll_interval, Duration::from_secs(30));
        assert_eq!(runtime.bridge.request_timeout, Duration::from_secs(30));
        assert_eq!(runtime.bridge.cognito.region, "eu-west-1");
        assert_eq!(runtime.bridge.cognito.user_pool_id, "us-west-2_lbiduhSwD");

        let broker = runtime.broker.unwrap();
        assert_eq!(broker.address(), "file-broker:8883");
        assert_eq!(broker.status_topic, None);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let overrides = Overrides {
            poll_interval: Some(0),
            ..complete()
        };
        let err = load_from(None, overrides).unwrap().resolve(false).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "poll_interval"));
    }
}
