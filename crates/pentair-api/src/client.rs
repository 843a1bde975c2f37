// Pentair cloud HTTP client
//
// Wraps `reqwest::Client` with SigV4 signing and the headers the API gateway
// expects from the mobile app. Endpoint modules (devices, profile) are
// implemented as inherent methods in separate files to keep this module
// focused on transport mechanics.

use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HOST, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::auth::CloudCredentials;
use crate::error::Error;
use crate::sigv4::{self, CanonicalRequest, EMPTY_PAYLOAD_SHA256, EXECUTE_API, SigningParams};
use crate::transport::TransportConfig;

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.pentair.cloud/";

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
const X_AMZ_DATE: &str = "x-amz-date";
const X_AMZ_ID_TOKEN: &str = "x-amz-id-token";
const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// Signed client for the Pentair Home API.
///
/// Holds one immutable set of [`CloudCredentials`]. When they expire, build a
/// new client from fresh credentials rather than mutating this one.
pub struct CloudClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: CloudCredentials,
}

impl CloudClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is normalised to end with `/` so endpoint paths join
    /// beneath it rather than replacing its last segment.
    pub fn new(
        base_url: Url,
        credentials: CloudCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(
            transport.build_client()?,
            base_url,
            credentials,
        ))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: CloudCredentials) -> Self {
        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            credentials,
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}{path}`, e.g. `https://api.pentair.cloud/device2/...`
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Signed GET, JSON-decoded.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        self.send(Method::GET, url, None).await
    }

    /// Signed POST with a JSON body, JSON-decoded.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let payload = serde_json::to_vec(body)?;
        self.send(Method::POST, url, Some(payload)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<T, Error> {
        let headers = self.signed_headers(&method, &url, body.as_deref())?;

        let mut builder = self.http.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let resp = builder.send().await.map_err(Error::Transport)?;

        Self::parse_response(resp).await
    }

    /// Build the full header set, including the SigV4 `Authorization`.
    ///
    /// Any header value that cannot be encoded aborts the request.
    fn signed_headers(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<HeaderMap, Error> {
        let creds = &self.credentials;
        let now = Utc::now();
        let amz_date = sigv4::amz_date(now);

        let host = url.host_str().ok_or_else(|| Error::Signing {
            message: format!("URL has no host: {url}"),
        })?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        let payload_hash = match body {
            Some(bytes) => sigv4::sha256_hex(bytes),
            None => EMPTY_PAYLOAD_SHA256.to_owned(),
        };

        let to_sign = vec![
            (CONTENT_TYPE.as_str().to_owned(), JSON_CONTENT_TYPE.to_owned()),
            (HOST.as_str().to_owned(), host),
            (X_AMZ_DATE.to_owned(), amz_date),
            (
                X_AMZ_ID_TOKEN.to_owned(),
                creds.identity_token.expose_secret().to_owned(),
            ),
            (
                X_AMZ_SECURITY_TOKEN.to_owned(),
                creds.session_token.expose_secret().to_owned(),
            ),
        ];

        let signature = sigv4::sign(
            &SigningParams {
                access_key_id: &creds.access_key_id,
                secret_key: creds.secret_key.expose_secret(),
                region: &creds.region,
                service: EXECUTE_API,
                time: now,
            },
            &CanonicalRequest {
                method: method.as_str(),
                path: url.path(),
                query: url.query().unwrap_or(""),
                headers: to_sign.clone(),
                payload_hash: &payload_hash,
            },
        );
        trace!(signed_headers = %signature.signed_headers, "request signed");

        let mut headers = HeaderMap::with_capacity(to_sign.len() + 1);
        for (name, value) in to_sign {
            // reqwest derives Host from the URL.
            if name == HOST.as_str() {
                continue;
            }
            headers.insert(header_name(&name)?, header_value(&name, &value)?);
        }
        headers.insert(
            AUTHORIZATION,
            header_value(AUTHORIZATION.as_str(), &signature.authorization)?,
        );
        Ok(headers)
    }

    /// Map non-2xx to `Error::Api` and decode the body.
    async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}

fn header_name(name: &str) -> Result<HeaderName, Error> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Signing {
        message: format!("invalid header name {name}: {e}"),
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|e| Error::Signing {
        message: format!("invalid value for {name}: {e}"),
    })
}
