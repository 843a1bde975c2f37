// AWS JSON 1.1 calls
//
// Every Cognito operation is a POST to the service root with the operation
// named in `X-Amz-Target`. Failures come back as `{"__type", "message"}`
// with a 4xx status.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;

const AMZ_JSON: &str = "application/x-amz-json-1.1";

pub(crate) const INITIATE_AUTH: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
pub(crate) const RESPOND_TO_AUTH_CHALLENGE: &str =
    "AWSCognitoIdentityProviderService.RespondToAuthChallenge";
pub(crate) const GET_ID: &str = "AWSCognitoIdentityService.GetId";
pub(crate) const GET_CREDENTIALS_FOR_IDENTITY: &str =
    "AWSCognitoIdentityService.GetCredentialsForIdentity";

#[derive(serde::Deserialize)]
struct AwsJsonError {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

pub(crate) async fn call<Req, Resp>(
    http: &reqwest::Client,
    endpoint: &Url,
    operation: &str,
    body: &Req,
) -> Result<Resp, Error>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    debug!(operation, "POST {}", endpoint);

    let payload = serde_json::to_vec(body)?;
    let resp = http
        .post(endpoint.clone())
        .header(reqwest::header::CONTENT_TYPE, AMZ_JSON)
        .header("X-Amz-Target", operation)
        .body(payload)
        .send()
        .await
        .map_err(Error::Transport)?;

    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;
    trace!(operation, %status, "cognito response received");

    if !status.is_success() {
        return Err(service_error(status.as_u16(), body));
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{operation}: {e}"),
        body: body.clone(),
    })
}

/// Map an error body to `Error::Cognito`, falling back to the raw status.
fn service_error(status: u16, body: String) -> Error {
    match serde_json::from_str::<AwsJsonError>(&body) {
        Ok(AwsJsonError {
            kind: Some(kind), message,
        }) => {
            let kind = kind.rsplit_once('#').map_or(kind.as_str(), |(_, k)| k);
            Error::Cognito {
                kind: kind.to_owned(),
                message: message.unwrap_or_default(),
            }
        }
        _ => Error::Api { status, body },
    }
}
