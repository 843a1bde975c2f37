// User-pool SRP login
//
// InitiateAuth (USER_SRP_AUTH) -> PASSWORD_VERIFIER challenge ->
// RespondToAuthChallenge -> AuthenticationResult.

use std::collections::HashMap;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rpc::{self, INITIATE_AUTH, RESPOND_TO_AUTH_CHALLENGE};
use super::srp::{self, PasswordVerifier, SrpSession};
use super::{CredentialProvider, Identity};
use crate::error::Error;

const USER_SRP_AUTH: &str = "USER_SRP_AUTH";
const PASSWORD_VERIFIER: &str = "PASSWORD_VERIFIER";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: HashMap<&'static str, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    challenge_name: Option<String>,
    #[serde(default)]
    challenge_parameters: HashMap<String, String>,
    session: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RespondToAuthChallengeRequest<'a> {
    challenge_name: &'a str,
    client_id: &'a str,
    challenge_responses: HashMap<&'static str, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RespondToAuthChallengeResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

impl CredentialProvider {
    /// Log in to the user pool with SRP and return the issued tokens.
    ///
    /// Any challenge other than `PASSWORD_VERIFIER` (MFA, new password
    /// required, ...) fails with [`Error::UnexpectedChallenge`].
    pub async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Identity, Error> {
        let endpoint = self.config.idp_url()?;
        let session = SrpSession::new();

        let initiate = InitiateAuthRequest {
            auth_flow: USER_SRP_AUTH,
            client_id: &self.config.client_id,
            auth_parameters: HashMap::from([
                ("USERNAME", username.to_owned()),
                ("SRP_A", session.public_a_hex()),
            ]),
        };
        let challenge: InitiateAuthResponse =
            rpc::call(&self.http, &endpoint, INITIATE_AUTH, &initiate).await?;

        match challenge.challenge_name.as_deref() {
            Some(PASSWORD_VERIFIER) => {}
            other => {
                return Err(Error::UnexpectedChallenge {
                    challenge: other.unwrap_or("<none>").to_owned(),
                });
            }
        }

        let verifier = PasswordVerifier::from_parameters(&challenge.challenge_parameters)?;
        debug!(user_id = %verifier.user_id_for_srp, "answering password verifier challenge");

        let timestamp = srp::format_timestamp(Utc::now());
        let signature = session.password_claim(
            self.config.pool_name(),
            &verifier,
            password.expose_secret(),
            &timestamp,
        )?;

        let respond = RespondToAuthChallengeRequest {
            challenge_name: PASSWORD_VERIFIER,
            client_id: &self.config.client_id,
            challenge_responses: HashMap::from([
                ("TIMESTAMP", timestamp),
                ("USERNAME", verifier.user_id_for_srp.clone()),
                ("PASSWORD_CLAIM_SECRET_BLOCK", verifier.secret_block.clone()),
                ("PASSWORD_CLAIM_SIGNATURE", signature),
            ]),
            session: challenge.session,
        };
        let answer: RespondToAuthChallengeResponse =
            rpc::call(&self.http, &endpoint, RESPOND_TO_AUTH_CHALLENGE, &respond).await?;

        let Some(result) = answer.authentication_result else {
            return Err(match answer.challenge_name {
                Some(challenge) => Error::UnexpectedChallenge { challenge },
                None => Error::Authentication {
                    message: "no authentication result returned".into(),
                },
            });
        };

        debug!(expires_in = ?result.expires_in, "user pool login succeeded");
        Ok(Identity {
            id_token: result.id_token.into(),
            access_token: result.access_token.into(),
            refresh_token: result.refresh_token.map(SecretString::from),
            expires_in: result.expires_in,
        })
    }
}
