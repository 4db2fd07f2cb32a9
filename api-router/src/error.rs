use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::EmbeddingDrift(_) => Self::ServiceUnavailable(
                "Embedding configuration mismatch detected. \
                 Trigger a rebuild via the init job before querying."
                    .to_string(),
            ),
            AppError::StoreConnection(_) => Self::ServiceUnavailable(
                "The vector store is not reachable. Please try again later.".to_string(),
            ),
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::Validation(msg) => Self::ValidationError(msg),
            _ => {
                tracing::error!("Internal error: {:?}", err);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::InternalError(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: message,
                    status: "error".to_string(),
                },
            ),
            Self::ValidationError(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    status: "error".to_string(),
                },
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: message,
                    status: "error".to_string(),
                },
            ),
            Self::ServiceUnavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: message,
                    status: "error".to_string(),
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    fn assert_status_code<T: IntoResponse + Debug>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn test_app_error_to_api_error_conversion() {
        let drift = AppError::EmbeddingDrift("stored=abc current=def".to_string());
        let api_error = ApiError::from(drift);
        assert!(
            matches!(&api_error, ApiError::ServiceUnavailable(msg) if msg.contains("rebuild"))
        );

        let connection = AppError::StoreConnection("connection refused".to_string());
        let api_error = ApiError::from(connection);
        assert!(
            matches!(&api_error, ApiError::ServiceUnavailable(msg) if msg.contains("not reachable"))
        );

        let not_found = AppError::NotFound("resource not found".to_string());
        let api_error = ApiError::from(not_found);
        assert!(matches!(api_error, ApiError::NotFound(msg) if msg == "resource not found"));

        let validation = AppError::Validation("invalid input".to_string());
        let api_error = ApiError::from(validation);
        assert!(matches!(api_error, ApiError::ValidationError(msg) if msg == "invalid input"));
    }

    #[test]
    fn test_status_codes() {
        assert_status_code(
            ApiError::ServiceUnavailable("drift".into()),
            StatusCode::SERVICE_UNAVAILABLE,
        );
        assert_status_code(
            ApiError::ValidationError("bad".into()),
            StatusCode::BAD_REQUEST,
        );
        assert_status_code(ApiError::NotFound("gone".into()), StatusCode::NOT_FOUND);
        assert_status_code(
            ApiError::InternalError("boom".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
    }
}
