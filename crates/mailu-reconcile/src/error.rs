//! Reconciliation error types
//!
//! Errors returned from a reconciliation are terminal for that invocation:
//! the dispatcher logs them and waits for the next resync, except for
//! transient store failures which it retries with backoff. Outcomes that
//! are expected to clear on their own (remote 502/503/504, transport
//! failures) are not errors at all; they come back as
//! [`Outcome::RequeueAfter`](crate::engine::Outcome::RequeueAfter).

use mailu_client::{ClientError, StatusCode};
use thiserror::Error;

use crate::resource::ResourceKind;

/// Error from the desired-state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist (anymore).
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// A concurrent writer changed the object.
    #[error("conflicting write on {key}: {message}")]
    Conflict { key: String, message: String },

    /// The store could not be reached.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Check if retrying the same write later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::Unavailable { .. }
        )
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error that ends a reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The API rejected the token (401).
    #[error("mailu api rejected credentials during {operation}: {message}")]
    Unauthorized { operation: String, message: String },

    /// The token lacks permission (403).
    #[error("mailu api denied {operation}: {message}")]
    Forbidden { operation: String, message: String },

    /// The API answered with a status this operation has no handling for.
    #[error("unexpected status {status} from {operation}: {message}")]
    UnexpectedStatus {
        operation: String,
        status: u16,
        message: String,
    },

    /// The desired entity cannot be built from the declared state.
    #[error("invalid {kind} spec for {key}: {message}")]
    InvalidSpec {
        kind: ResourceKind,
        key: String,
        message: String,
    },

    /// A 200 response body did not decode.
    #[error("failed to decode {operation} response: {message}")]
    Decode {
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Store read or write failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Client failed for a reason other than transport (e.g. a bad URL).
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ReconcileError {
    /// Map an authorization failure status to the matching variant.
    ///
    /// Returns `None` for statuses other than 401 and 403.
    pub fn from_auth_status(
        status: StatusCode,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Option<Self> {
        match status {
            StatusCode::UNAUTHORIZED => Some(ReconcileError::Unauthorized {
                operation: operation.into(),
                message: message.into(),
            }),
            StatusCode::FORBIDDEN => Some(ReconcileError::Forbidden {
                operation: operation.into(),
                message: message.into(),
            }),
            _ => None,
        }
    }

    /// Create an unexpected status error.
    pub fn unexpected(operation: impl Into<String>, status: StatusCode, message: impl Into<String>) -> Self {
        ReconcileError::UnexpectedStatus {
            operation: operation.into(),
            status: status.as_u16(),
            message: message.into(),
        }
    }

    /// Create a decode error with its source.
    pub fn decode(operation: impl Into<String>, source: serde_json::Error) -> Self {
        ReconcileError::Decode {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if the dispatcher should retry with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ReconcileError::Store(e) => e.is_transient(),
            ReconcileError::Client(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Get a short error code suitable for logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ReconcileError::Unauthorized { .. } => "UNAUTHORIZED",
            ReconcileError::Forbidden { .. } => "FORBIDDEN",
            ReconcileError::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            ReconcileError::InvalidSpec { .. } => "INVALID_SPEC",
            ReconcileError::Decode { .. } => "DECODE",
            ReconcileError::Store(_) => "STORE",
            ReconcileError::Client(_) => "CLIENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_auth_status() {
        let err = ReconcileError::from_auth_status(StatusCode::UNAUTHORIZED, "find domain", "no token");
        assert!(matches!(err, Some(ReconcileError::Unauthorized { .. })));

        let err = ReconcileError::from_auth_status(StatusCode::FORBIDDEN, "find domain", "denied");
        assert!(matches!(err, Some(ReconcileError::Forbidden { .. })));

        assert!(ReconcileError::from_auth_status(StatusCode::BAD_REQUEST, "x", "y").is_none());
    }

    #[test]
    fn test_transient_classification() {
        let err = ReconcileError::Store(StoreError::Conflict {
            key: "default/example".to_string(),
            message: "resource version changed".to_string(),
        });
        assert!(err.is_transient());

        let err = ReconcileError::Store(StoreError::NotFound {
            key: "default/example".to_string(),
        });
        assert!(!err.is_transient());

        let err = ReconcileError::unexpected("find domain", StatusCode::IM_A_TEAPOT, "teapot");
        assert!(!err.is_transient());
        assert_eq!(err.error_code(), "UNEXPECTED_STATUS");
        assert!(err.to_string().contains("418"));
    }

    #[test]
    fn test_invalid_spec_display() {
        let err = ReconcileError::InvalidSpec {
            kind: ResourceKind::Mailbox,
            key: "john@example.com".to_string(),
            message: "invalid replyStartDate".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid Mailbox spec for john@example.com: invalid replyStartDate"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_decode_keeps_source() {
        use std::error::Error as _;

        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ReconcileError::decode("find alias", source);
        assert!(err.source().is_some());
        assert_eq!(err.error_code(), "DECODE");
    }
}
