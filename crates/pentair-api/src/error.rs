use thiserror::Error;

/// Top-level error type for the `pentair-api` crate.
///
/// Covers every failure mode of the two cloud surfaces: the Cognito
/// credential exchange and the signed Pentair API.
/// `pentair-core` maps these into bridge-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// SRP login failed (bad password, malformed challenge, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Cognito answered `InitiateAuth` with something other than
    /// `PASSWORD_VERIFIER`.
    #[error("Unexpected authentication challenge: {challenge}")]
    UnexpectedChallenge { challenge: String },

    /// Structured error from a Cognito endpoint (`{"__type", "message"}`).
    #[error("Cognito error ({kind}): {message}")]
    Cognito { kind: String, message: String },

    /// The identity-pool exchange did not yield usable credentials.
    #[error("Credential exchange failed: {message}")]
    CredentialExchange { message: String },

    /// Request signing failed; the request is never sent.
    #[error("Request signing failed: {message}")]
    Signing { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Pentair API ─────────────────────────────────────────────────
    /// Non-success HTTP status from the Pentair API.
    #[error("Pentair API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The device endpoint returned an empty result set.
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A request body could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Cognito error kinds that mean the account itself was refused.
const AUTH_FAILURE_KINDS: &[&str] = &[
    "NotAuthorizedException",
    "UserNotFoundException",
    "UserNotConfirmedException",
    "PasswordResetRequiredException",
];

impl Error {
    /// Returns `true` if the account or its credentials were refused, as
    /// opposed to the request failing for some other reason.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::UnexpectedChallenge { .. } => true,
            Self::Cognito { kind, .. } => AUTH_FAILURE_KINDS.contains(&kind.as_str()),
            Self::Api { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }
}
