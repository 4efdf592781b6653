use std::fmt;
use std::time::Duration;

use mailu_client::MailuConfig;
use mailu_reconcile::{DispatcherConfig, ReconcilerConfig};

const DEFAULT_API_URL: &str = "http://mailu-front:80/api/v1";

/// Configuration for the operator binary.
#[derive(Clone)]
pub struct OperatorConfig {
    /// Base URL of the Mailu admin API.
    pub api_url: String,

    /// Bearer token for the admin API.
    pub api_token: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Verify the server's TLS certificate.
    pub tls_verify: bool,

    /// Delay returned with retryable outcomes.
    pub retry_delay_secs: u64,

    /// Keys reconciled concurrently per resource kind.
    pub concurrency: usize,

    /// Interval between full resyncs in `run` mode.
    pub resync_secs: u64,

    /// Backoff after a transient reconciliation error.
    pub error_backoff_secs: u64,
}

impl OperatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let api_url = reader("MAILU_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let api_token = reader("MAILU_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("MAILU_API_TOKEN".into()))?;

        let timeout_secs = parse_var(&reader, "MAILU_TIMEOUT_SECS", 30u64)?;
        let tls_verify = parse_var(&reader, "MAILU_TLS_VERIFY", true)?;
        let retry_delay_secs = parse_var(&reader, "RECONCILE_RETRY_DELAY_SECS", 5u64)?;
        let concurrency = parse_var(&reader, "RECONCILE_CONCURRENCY", 4usize)?;
        let resync_secs = parse_var(&reader, "RECONCILE_RESYNC_SECS", 300u64)?;
        let error_backoff_secs = parse_var(&reader, "RECONCILE_ERROR_BACKOFF_SECS", 30u64)?;

        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "MAILU_TIMEOUT_SECS".into(),
                "must be greater than zero".into(),
            ));
        }
        if concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "RECONCILE_CONCURRENCY".into(),
                "must be greater than zero".into(),
            ));
        }
        if resync_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "RECONCILE_RESYNC_SECS".into(),
                "must be greater than zero".into(),
            ));
        }

        Ok(Self {
            api_url,
            api_token,
            timeout_secs,
            tls_verify,
            retry_delay_secs,
            concurrency,
            resync_secs,
            error_backoff_secs,
        })
    }

    /// Client settings.
    pub fn mailu_config(&self) -> MailuConfig {
        MailuConfig::new(&self.api_url, &self.api_token)
            .with_timeout_secs(self.timeout_secs)
            .with_tls_verify(self.tls_verify)
            .with_user_agent(concat!("mailu-operator/", env!("CARGO_PKG_VERSION")))
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            concurrency: self.concurrency,
            resync_interval: Duration::from_secs(self.resync_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
        }
    }
}

impl fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"***")
            .field("timeout_secs", &self.timeout_secs)
            .field("tls_verify", &self.tls_verify)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("concurrency", &self.concurrency)
            .field("resync_secs", &self.resync_secs)
            .field("error_backoff_secs", &self.error_backoff_secs)
            .finish()
    }
}

fn parse_var<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match reader(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
