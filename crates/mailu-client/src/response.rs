//! Raw API responses.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::models::ApiErrorBody;

/// Status and body of a completed HTTP exchange.
///
/// Returned for every status code; deciding what a status means is left to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// Build a response from a status and body.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Build a response with an empty body.
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, String::new())
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Human readable failure message.
    ///
    /// Uses the `message` field of a JSON error body when present, otherwise
    /// the trimmed body, otherwise the status reason.
    #[must_use]
    pub fn message(&self) -> String {
        if let Ok(ApiErrorBody {
            message: Some(message),
            ..
        }) = serde_json::from_str::<ApiErrorBody>(&self.body)
        {
            return message;
        }

        let trimmed = self.body.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }

        self.status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    }
}
