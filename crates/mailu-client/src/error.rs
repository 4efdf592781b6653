//! Mailu client error types
//!
//! Only failures that prevent an HTTP exchange from completing are errors
//! here. Any response the server actually sends, whatever its status code,
//! comes back as an [`ApiResponse`](crate::ApiResponse) for the caller to
//! classify.

use thiserror::Error;

/// Error that can occur while talking to the Mailu API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be delivered or the response could not be read.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Client configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A request URL could not be built from the base URL and path.
    #[error("invalid url: {message}")]
    InvalidUrl { message: String },
}

impl ClientError {
    /// Create a transport error with a source error.
    pub fn transport(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ClientError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        ClientError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Check if this error is transient (a later attempt may succeed).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Transport { .. } | ClientError::Timeout { .. }
        )
    }

    /// Get a short error code suitable for logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Transport { .. } => "TRANSPORT",
            ClientError::Timeout { .. } => "TIMEOUT",
            ClientError::InvalidConfig { .. } => "INVALID_CONFIG",
            ClientError::InvalidUrl { .. } => "INVALID_URL",
        }
    }
}

/// Result type for Mailu client operations.
pub type ClientResult<T> = Result<T, ClientError>;
