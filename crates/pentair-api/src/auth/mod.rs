// Pentair Home credential provider
//
// Two Cognito round trips turn a username/password into signing material:
// the user pool (SRP login -> identity token) and the identity pool
// (identity token -> temporary AWS credentials). Both speak the AWS
// JSON 1.1 protocol; see `rpc`.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

mod identity_pool;
mod rpc;
pub mod srp;
mod user_pool;

/// Cognito coordinates of the Pentair Home app.
///
/// The defaults are the production pools. The endpoint overrides exist so
/// tests (and regional proxies) can redirect the two services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitoConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub identity_pool_id: String,
    /// Overrides `https://cognito-idp.<region>.amazonaws.com/`.
    pub idp_endpoint: Option<Url>,
    /// Overrides `https://cognito-identity.<region>.amazonaws.com/`.
    pub identity_endpoint: Option<Url>,
}

impl Default for CognitoConfig {
    fn default() -> Self {
        Self {
            region: "us-west-2".into(),
            user_pool_id: "us-west-2_lbiduhSwD".into(),
            client_id: "3de110o697faq7avdchtf07h4v".into(),
            identity_pool_id: "us-west-2:6f950f85-af44-43d9-b690-a431f753e9aa".into(),
            idp_endpoint: None,
            identity_endpoint: None,
        }
    }
}

impl CognitoConfig {
    /// Key under which the identity token is presented to the identity pool:
    /// `cognito-idp.<region>.amazonaws.com/<user_pool_id>`.
    pub fn login_key(&self) -> String {
        format!(
            "cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }

    /// The pool id without its region prefix (`us-west-2_abc` -> `abc`).
    /// SRP hashes mix this in.
    pub fn pool_name(&self) -> &str {
        self.user_pool_id
            .split_once('_')
            .map_or(self.user_pool_id.as_str(), |(_, name)| name)
    }

    pub fn idp_url(&self) -> Result<Url, Error> {
        match &self.idp_endpoint {
            Some(url) => Ok(url.clone()),
            None => Ok(Url::parse(&format!(
                "https://cognito-idp.{}.amazonaws.com/",
                self.region
            ))?),
        }
    }

    pub fn identity_url(&self) -> Result<Url, Error> {
        match &self.identity_endpoint {
            Some(url) => Ok(url.clone()),
            None => Ok(Url::parse(&format!(
                "https://cognito-identity.{}.amazonaws.com/",
                self.region
            ))?),
        }
    }
}

/// Tokens issued by the user pool after a successful SRP login.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id_token: SecretString,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// Token lifetime in seconds, as reported by Cognito.
    pub expires_in: Option<u64>,
}

/// Temporary AWS credentials scoped to the caller's federated identity,
/// plus the identity token the Pentair API also wants to see.
#[derive(Debug, Clone)]
pub struct CloudCredentials {
    pub identity_token: SecretString,
    pub identity_id: String,
    pub access_key_id: String,
    pub secret_key: SecretString,
    pub session_token: SecretString,
    pub region: String,
    pub expiration: Option<DateTime<Utc>>,
}

/// Turns account credentials into [`CloudCredentials`].
///
/// Stateless apart from the HTTP connection pool: every call performs a
/// full exchange and nothing is retried.
pub struct CredentialProvider {
    http: reqwest::Client,
    config: CognitoConfig,
}

impl CredentialProvider {
    pub fn new(config: CognitoConfig, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            config,
        })
    }

    /// Share an existing `reqwest::Client` (and its pool).
    pub fn with_client(http: reqwest::Client, config: CognitoConfig) -> Self {
        Self { http, config }
    }

    /// SRP login followed by the identity-pool exchange.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<CloudCredentials, Error> {
        debug!(username, region = %self.config.region, "logging in to Pentair cloud");

        let identity = self.authenticate(username, password).await?;
        let credentials = self.exchange_for_cloud_credentials(&identity).await?;

        info!(
            identity_id = %credentials.identity_id,
            expires = ?credentials.expiration,
            "obtained cloud credentials"
        );
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_key_joins_region_and_pool() {
        let config = CognitoConfig {
            region: "eu-central-1".into(),
            user_pool_id: "eu-central-1_Abc123".into(),
            ..CognitoConfig::default()
        };
        assert_eq!(
            config.login_key(),
            "cognito-idp.eu-central-1.amazonaws.com/eu-central-1_Abc123"
        );
        assert_eq!(
            CognitoConfig::default().login_key(),
            "cognito-idp.us-west-2.amazonaws.com/us-west-2_lbiduhSwD"
        );
    }

    #[test]
    fn pool_name_strips_region_prefix() {
        assert_eq!(CognitoConfig::default().pool_name(), "lbiduhSwD");

        let bare = CognitoConfig {
            user_pool_id: "nounderscore".into(),
            ..CognitoConfig::default()
        };
        assert_eq!(bare.pool_name(), "nounderscore");
    }

    #[test]
    fn endpoints_default_to_regional_hosts() {
        let config = CognitoConfig::default();
        assert_eq!(
            config.idp_url().ok().map(String::from),
            Some("https://cognito-idp.us-west-2.amazonaws.com/".to_string())
        );
        assert_eq!(
            config.identity_url().ok().map(String::from),
            Some("https://cognito-identity.us-west-2.amazonaws.com/".to_string())
        );
    }
}
