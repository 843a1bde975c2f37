// Identity-pool credential exchange
//
// GetId resolves the federated identity for the login, then
// GetCredentialsForIdentity mints the temporary access/secret/session triple.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rpc::{self, GET_CREDENTIALS_FOR_IDENTITY, GET_ID};
use super::{CloudCredentials, CredentialProvider, Identity};
use crate::error::Error;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdRequest<'a> {
    identity_pool_id: &'a str,
    logins: HashMap<String, &'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
    identity_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsRequest<'a> {
    identity_id: &'a str,
    logins: HashMap<String, &'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
    identity_id: Option<String>,
    credentials: Option<RawCredentials>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCredentials {
    access_key_id: Option<String>,
    secret_key: Option<String>,
    session_token: Option<String>,
    /// Seconds since the epoch.
    expiration: Option<f64>,
}

impl CredentialProvider {
    /// Trade a user-pool identity for temporary AWS credentials.
    pub async fn exchange_for_cloud_credentials(
        &self,
        identity: &Identity,
    ) -> Result<CloudCredentials, Error> {
        let endpoint = self.config.identity_url()?;
        let id_token = identity.id_token.expose_secret();
        let logins = HashMap::from([(self.config.login_key(), id_token)]);

        let resolved: GetIdResponse = rpc::call(
            &self.http,
            &endpoint,
            GET_ID,
            &GetIdRequest {
                identity_pool_id: &self.config.identity_pool_id,
                logins: logins.clone(),
            },
        )
        .await?;
        let identity_id = resolved.identity_id.ok_or_else(|| Error::CredentialExchange {
            message: "GetId returned no IdentityId".into(),
        })?;
        debug!(%identity_id, "resolved federated identity");

        let minted: GetCredentialsResponse = rpc::call(
            &self.http,
            &endpoint,
            GET_CREDENTIALS_FOR_IDENTITY,
            &GetCredentialsRequest {
                identity_id: &identity_id,
                logins,
            },
        )
        .await?;

        let raw = minted.credentials.ok_or_else(|| Error::CredentialExchange {
            message: "GetCredentialsForIdentity returned no Credentials".into(),
        })?;
        let (Some(access_key_id), Some(secret_key), Some(session_token)) =
            (raw.access_key_id, raw.secret_key, raw.session_token)
        else {
            return Err(Error::CredentialExchange {
                message: "credentials are missing a key, secret or session token".into(),
            });
        };

        Ok(CloudCredentials {
            identity_token: identity.id_token.clone(),
            identity_id: minted.identity_id.unwrap_or(identity_id),
            access_key_id,
            secret_key: secret_key.into(),
            session_token: session_token.into(),
            region: self.config.region.clone(),
            expiration: raw.expiration.and_then(epoch_to_datetime),
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs.trunc() as i64, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractional_epoch_is_truncated() {
        let at = epoch_to_datetime(1_700_000_000.75).map(|t| t.timestamp());
        assert_eq!(at, Some(1_700_000_000));
    }
}
