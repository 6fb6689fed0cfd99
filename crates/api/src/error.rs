//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use projections::ProjectionError;
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request that never reached the domain.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Read model could not catch up with the store.
    Projection(ProjectionError),
    /// Internal server error.
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    shortfall: Option<u64>,
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState | ErrorKind::Conflict | ErrorKind::ConcurrencyConflict => {
            StatusCode::CONFLICT
        }
        ErrorKind::InsufficientStock => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Infrastructure => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: msg,
                    code: ErrorKind::Validation.code(),
                    shortfall: None,
                },
            ),
            ApiError::Domain(err) => {
                let kind = err.kind();
                if kind == ErrorKind::Infrastructure {
                    tracing::error!(error = %err, "infrastructure failure");
                }
                (
                    status_for(kind),
                    ErrorBody {
                        error: err.to_string(),
                        code: kind.code(),
                        shortfall: err.shortfall().map(|q| q.units()),
                    },
                )
            }
            ApiError::Projection(err) => {
                tracing::error!(error = %err, "projection catch-up failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        error: err.to_string(),
                        code: ErrorKind::Infrastructure.code(),
                        shortfall: None,
                    },
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: msg,
                        code: ErrorKind::Infrastructure.code(),
                        shortfall: None,
                    },
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_status() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::InvalidState), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::ConcurrencyConflict),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(ErrorKind::InsufficientStock),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(ErrorKind::Infrastructure),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn bad_request_uses_validation_code() {
        let response = ApiError::BadRequest("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
