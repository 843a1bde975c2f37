// Shared transport configuration for building reqwest::Client instances.
//
// The Cognito endpoints and the Pentair API share one connection pool,
// timeout and user agent through this module.

use std::time::Duration;

/// User agent the Pentair Home mobile app sends. The API gateway
/// expects it on every signed request.
pub const PENTAIR_USER_AGENT: &str = "aws-amplify/4.3.10 react-native";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            user_agent: PENTAIR_USER_AGENT.into(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(crate::error::Error::Transport)
    }

    /// Override the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
