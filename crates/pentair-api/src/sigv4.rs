// AWS Signature Version 4
//
// Header-based signing only: canonical request -> string to sign ->
// HMAC key chain. No presigned URLs, no chunked payloads. Everything here
// is a pure function of its inputs so it can be checked against the
// published AWS test vectors.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest as _, Sha256};

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Service name the Pentair API gateway is signed for.
pub const EXECUTE_API: &str = "execute-api";

/// SHA-256 of the empty string, the payload hash of a body-less request.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Credential scope and key material for one signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    pub access_key_id: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

/// The parts of an HTTP request that take part in the signature.
///
/// `headers` must already contain every header to be signed, including
/// `host` and `x-amz-date`. Names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub headers: Vec<(String, String)>,
    pub payload_hash: &'a str,
}

/// Result of signing: the `Authorization` header value and its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub authorization: String,
    pub signed_headers: String,
    pub signature: String,
}

/// `x-amz-date` format: `20150830T123600Z`.
pub fn amz_date(time: DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

fn scope_date(time: DateTime<Utc>) -> String {
    time.format("%Y%m%d").to_string()
}

/// Sign a request. Never fails: all inputs are plain strings.
pub fn sign(params: &SigningParams<'_>, request: &CanonicalRequest<'_>) -> Signature {
    let headers = canonical_headers(&request.headers);
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = canonical_request(request, &headers, &signed_headers);
    let date = scope_date(params.time);
    let scope = format!(
        "{date}/{}/{}/aws4_request",
        params.region, params.service
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{scope}\n{}",
        amz_date(params.time),
        sha256_hex(canonical.as_bytes())
    );

    let key = signing_key(params.secret_key, &date, params.region, params.service);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    Signature {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            params.access_key_id
        ),
        signed_headers,
        signature,
    }
}

/// Derive the per-day, per-region, per-service signing key.
pub fn signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn canonical_request(
    request: &CanonicalRequest<'_>,
    headers: &[(String, String)],
    signed_headers: &str,
) -> String {
    let mut header_block = String::new();
    for (name, value) in headers {
        header_block.push_str(name);
        header_block.push(':');
        header_block.push_str(value);
        header_block.push('\n');
    }

    format!(
        "{}\n{}\n{}\n{header_block}\n{signed_headers}\n{}",
        request.method.to_uppercase(),
        canonical_path(request.path),
        request.query,
        request.payload_hash
    )
}

/// Lowercase names, trim values and collapse inner whitespace, sort by name.
fn canonical_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
            (name.trim().to_lowercase(), value)
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

/// URI-encode every byte outside the unreserved set, keeping `/`.
fn canonical_path(path: &str) -> String {
    if path.is_empty() {
        return "/".into();
    }

    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~' | b'/') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
