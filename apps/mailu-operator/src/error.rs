//! Operator error types and exit codes

use mailu_client::ClientError;
use mailu_reconcile::{ReconcileError, StoreError};
use thiserror::Error;

use crate::config::ConfigError;

/// Exit codes for the operator
/// - 0: Success
/// - 1: General error
/// - 2: Authentication rejected by Mailu
/// - 3: Network error
/// - 4: Invalid configuration or manifest
/// - 5: One or more objects failed to reconcile
pub type OperatorResult<T> = Result<T, OperatorError>;

#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Mailu client error: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0} object(s) failed to reconcile")]
    ReconcileFailed(usize),
}

impl OperatorError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            OperatorError::Config(_) | OperatorError::Manifest(_) => 4,
            OperatorError::Client(ClientError::InvalidConfig { .. })
            | OperatorError::Client(ClientError::InvalidUrl { .. }) => 4,
            OperatorError::Client(_) => 3,
            OperatorError::Reconcile(
                ReconcileError::Unauthorized { .. } | ReconcileError::Forbidden { .. },
            ) => 2,
            OperatorError::Reconcile(ReconcileError::Client(_)) => 3,
            OperatorError::Reconcile(_) | OperatorError::ReconcileFailed(_) => 5,
            OperatorError::Store(_) | OperatorError::Io(_) | OperatorError::Serialization(_) => 1,
        }
    }

    /// Print the error to stderr.
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {suggestion}");
            } else {
                eprintln!("\nSuggestion: {suggestion}");
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            OperatorError::Config(ConfigError::MissingVar(_)) => {
                Some("Set MAILU_API_TOKEN in the environment or in a .env file")
            }
            OperatorError::Reconcile(ReconcileError::Unauthorized { .. }) => {
                Some("Check that MAILU_API_TOKEN matches the API token configured in Mailu")
            }
            OperatorError::Client(ClientError::Transport { .. }) => {
                Some("Check that MAILU_API_URL is reachable from this host")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailu_client::StatusCode;

    #[test]
    fn test_exit_codes() {
        assert_eq!(OperatorError::Manifest("bad".into()).exit_code(), 4);
        assert_eq!(
            OperatorError::Config(ConfigError::MissingVar("MAILU_API_TOKEN".into())).exit_code(),
            4
        );
        assert_eq!(OperatorError::ReconcileFailed(2).exit_code(), 5);
        assert_eq!(OperatorError::Io("disk".into()).exit_code(), 1);

        let unauthorized =
            ReconcileError::from_auth_status(StatusCode::UNAUTHORIZED, "find Domain", "denied")
                .unwrap();
        assert_eq!(OperatorError::Reconcile(unauthorized).exit_code(), 2);

        let transport = ClientError::Transport {
            message: "connection refused".into(),
            source: None,
        };
        assert_eq!(OperatorError::Client(transport).exit_code(), 3);
    }

    #[test]
    fn test_display() {
        let err = OperatorError::ReconcileFailed(3);
        assert_eq!(err.to_string(), "3 object(s) failed to reconcile");
    }
}
