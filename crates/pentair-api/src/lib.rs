//! Async client for the Pentair Home cloud.
//!
//! Two surfaces live here:
//!
//! - **[`CredentialProvider`]** turns a Pentair Home username/password into
//!   short-lived AWS credentials: Cognito `USER_SRP_AUTH` yields an identity
//!   token, which Cognito Identity exchanges for an access/secret/session
//!   triple.
//! - **[`CloudClient`]** issues SigV4-signed requests against
//!   `api.pentair.cloud` with those credentials (device list, device
//!   snapshot, account profile).
//!
//! Nothing in this crate retries. Every failure surfaces as an [`Error`]
//! and the caller decides whether to re-authenticate.

pub mod auth;
pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod profile;
pub mod sigv4;
pub mod transport;

pub use auth::{CloudCredentials, CognitoConfig, CredentialProvider, Identity};
pub use client::CloudClient;
pub use error::Error;
pub use models::{Device, DeviceField, ListedDevice, ProductInfo, Profile};
pub use transport::TransportConfig;
