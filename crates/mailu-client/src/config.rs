//! Mailu client configuration

use std::fmt;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const REDACTED: &str = "***REDACTED***";

/// Connection settings for a Mailu admin API.
#[derive(Clone)]
pub struct MailuConfig {
    /// Base URL of the API, e.g. `http://mailu-front:80/api/v1`.
    pub base_url: String,

    /// Bearer token sent with every request.
    pub api_token: String,

    /// Total request timeout in seconds.
    pub timeout_secs: u64,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Verify the server's TLS certificate.
    pub tls_verify: bool,

    /// User-Agent header value.
    pub user_agent: String,
}

impl MailuConfig {
    /// Create a config with the required fields and defaults for the rest.
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            tls_verify: true,
            user_agent: concat!("mailu-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Override the User-Agent header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ClientResult<url::Url> {
        if self.base_url.is_empty() {
            return Err(ClientError::invalid_config("base_url is required"));
        }
        if self.api_token.trim().is_empty() {
            return Err(ClientError::invalid_config("api_token is required"));
        }
        if self.timeout_secs == 0 {
            return Err(ClientError::invalid_config(
                "timeout_secs must be greater than zero",
            ));
        }

        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::invalid_config(format!("invalid base_url: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ClientError::invalid_config(format!(
                    "unsupported scheme: {other}"
                )))
            }
        }
        if url.cannot_be_a_base() {
            return Err(ClientError::invalid_config(
                "base_url cannot be used as a base",
            ));
        }

        Ok(url)
    }

    /// Copy of the config with the token masked, safe to log.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.api_token = REDACTED.to_string();
        config
    }
}

impl fmt::Debug for MailuConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailuConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &REDACTED)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("tls_verify", &self.tls_verify)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
