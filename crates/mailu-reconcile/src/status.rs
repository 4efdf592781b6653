//! Classification of remote responses.

use mailu_client::{ApiResponse, ClientError, ClientResult, StatusCode};

/// What a remote answer means for the reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// 2xx.
    Success(ApiResponse),
    /// 404.
    NotFound(ApiResponse),
    /// 409.
    Conflict(ApiResponse),
    /// 401 or 403: credentials are wrong for every resource, not just this one.
    AuthFailure(ApiResponse),
    /// 502, 503, 504 or a transport failure; worth trying again later.
    Retryable(String),
    /// 400 or 500: needs a spec or server fix.
    Permanent(ApiResponse),
    /// Anything else.
    Unexpected(ApiResponse),
}

/// Classify the outcome of a client call.
///
/// Transport failures are retryable; client errors that are not transport
/// related (bad URL, bad config) are returned unchanged.
pub fn classify(result: ClientResult<ApiResponse>) -> Result<Disposition, ClientError> {
    match result {
        Ok(response) => Ok(classify_response(response)),
        Err(e) if e.is_transient() => Ok(Disposition::Retryable(e.to_string())),
        Err(e) => Err(e),
    }
}

/// Classify a completed response by status code.
#[must_use]
pub fn classify_response(response: ApiResponse) -> Disposition {
    match response.status {
        s if s.is_success() => Disposition::Success(response),
        StatusCode::NOT_FOUND => Disposition::NotFound(response),
        StatusCode::CONFLICT => Disposition::Conflict(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Disposition::AuthFailure(response),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Disposition::Retryable(format!("{}: {}", response.status, response.message()))
        }
        StatusCode::BAD_REQUEST | StatusCode::INTERNAL_SERVER_ERROR => {
            Disposition::Permanent(response)
        }
        _ => Disposition::Unexpected(response),
    }
}
