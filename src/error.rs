use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::{AuthError, PasswordError};

pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by services and handlers outside the auth layer
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("{0}")]
    InvalidBody(String),
    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        AppError::BadRequest(detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        AppError::NotFound(detail.into())
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        AppError::Forbidden(detail.into())
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        AppError::Unauthorized(detail.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidBody(_) | AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Auth(err) => err.status_code(),
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Auth(AuthError::Password(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error, detail) = match self {
            // Auth errors carry their own headers
            AppError::Auth(err) => return err.into_response(),
            AppError::BadRequest(msg) => ("Bad request", msg),
            AppError::NotFound(msg) => ("Not found", msg),
            AppError::Forbidden(msg) => ("Forbidden", msg),
            AppError::Unauthorized(msg) => ("Unauthorized", msg),
            AppError::RateLimited => ("Rate limit exceeded", "Rate limit exceeded".to_string()),
            AppError::InvalidBody(msg) => ("Invalid request body", msg),
            AppError::Validation(errors) => ("Validation failed", errors.to_string()),
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                ("Database error", "Internal server error".to_string())
            }
            AppError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                ("Internal server error", "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error,
            "detail": detail,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let response = AppError::not_found("Session not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["detail"], "Session not found");
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let response = AppError::Internal(anyhow::anyhow!("redis exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["detail"], "Internal server error");
    }

    #[test]
    fn test_auth_status_passthrough() {
        let err = AppError::from(AuthError::CsrfMismatch);
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = AppError::from(PasswordError::TooShort(8));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
