//! Error types for the explorer HTTP boundary

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{AcquisitionError, RelayError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request, e.g. a non-numeric book identifier (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Book could not be retrieved from the remote archive (404)
    #[error("Failed to fetch book: {0}")]
    BookUnavailable(String),

    /// Upstream chat engine refused to start a stream (502)
    #[error("Failed to start analysis: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// lear-common error
    #[error("Common error: {0}")]
    Common(#[from] lear_common::Error),
}

impl From<AcquisitionError> for ApiError {
    fn from(err: AcquisitionError) -> Self {
        match err {
            AcquisitionError::Fetch(_) => ApiError::BookUnavailable(err.to_string()),
            AcquisitionError::CacheLookup(_)
            | AcquisitionError::MetadataDecode(_)
            | AcquisitionError::Persistence(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::StreamOpen(_) => ApiError::Upstream(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::BookUnavailable(msg) => (StatusCode::NOT_FOUND, "BOOK_UNAVAILABLE", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        tracing::warn!(status = %status, code = error_code, "Request failed: {}", message);

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ChatEngineError, ContentFetchError, FetchFailure};

    #[test]
    fn test_fetch_failure_maps_to_not_found() {
        let err: ApiError = AcquisitionError::Fetch(vec![FetchFailure::Content(
            ContentFetchError::Status(404, "url".to_string()),
        )])
        .into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_persistence_failure_maps_to_internal() {
        let err: ApiError =
            AcquisitionError::Persistence(lear_common::Error::Internal("disk".to_string())).into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_stream_open_maps_to_bad_gateway() {
        let err: ApiError = RelayError::StreamOpen(ChatEngineError::Request("refused".to_string())).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_bad_request_status() {
        let err = ApiError::BadRequest("id".to_string());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
