//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use aerolex_common::AerolexError;

/// Result type alias for server operations
pub type ServerResult<T> = std::result::Result<T, AppError>;

/// Application error types, mapped onto HTTP responses.
///
/// Non-2xx responses always carry a structured body:
/// `{"error": {"kind": "...", "message": "..."}}`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error on '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Aerolex error: {0}")]
    Core(#[from] AerolexError),
}

impl AppError {
    /// Stable machine-readable kind for the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::Unauthorized(_) => "auth_error",
            AppError::NotFound(_) => "not_found",
            AppError::Internal(_) => "internal_error",
            AppError::Core(e) => e.kind(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Core(e) => match e {
                AerolexError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Convenience for field-level request validation failures.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_and_status() {
        let err = AppError::validation("query", "must not be empty");
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = AppError::Unauthorized("invalid key".to_string());
        assert_eq!(err.kind(), "auth_error");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = AppError::Core(AerolexError::Store("boom".to_string()));
        assert_eq!(err.kind(), "store_error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_core_errors_convert() {
        let core = AerolexError::EmbeddingTimeout(10);
        let app: AppError = core.into();
        assert_eq!(app.kind(), "embedding_oracle_error");
    }
}
