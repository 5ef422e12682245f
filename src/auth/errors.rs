use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::{PasswordError, UserRole};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailAlreadyExists,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Could not validate credentials")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid authorization header format")]
    InvalidAuthHeaderFormat,
    #[error("User not found")]
    UserNotFound,
    #[error("Access denied. {} role required.", .0.display_name())]
    RoleRequired(UserRole),
    #[error("CSRF token mismatch")]
    CsrfMismatch,
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("{0}")]
    Password(#[from] PasswordError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::NotAuthenticated
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::InvalidAuthHeaderFormat
            | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthError::EmailAlreadyExists
            | AuthError::UsernameTaken
            | AuthError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AuthError::RoleRequired(_) | AuthError::CsrfMismatch => StatusCode::FORBIDDEN,
            AuthError::Password(err) if err.is_policy_violation() => StatusCode::BAD_REQUEST,
            AuthError::Password(_)
            | AuthError::Database(_)
            | AuthError::Jwt(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match status {
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::BAD_REQUEST => "Bad request",
            _ => "Internal server error",
        };

        let detail = match &self {
            AuthError::Database(err) => {
                tracing::error!("Database error during authentication: {}", err);
                "Internal server error".to_string()
            }
            AuthError::Jwt(err) => {
                tracing::error!("Failed to encode token: {}", err);
                "Internal server error".to_string()
            }
            AuthError::Internal(err) => {
                tracing::error!("Internal authentication error: {:#}", err);
                "Internal server error".to_string()
            }
            AuthError::Password(err) if !err.is_policy_violation() => {
                tracing::error!("Password processing error: {}", err);
                "Password processing error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "detail": detail,
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_required_message() {
        assert_eq!(
            AuthError::RoleRequired(UserRole::Coach).to_string(),
            "Access denied. Coach role required."
        );
        assert_eq!(
            AuthError::RoleRequired(UserRole::Athlete).to_string(),
            "Access denied. Athlete role required."
        );
    }

    #[test]
    fn test_unauthorized_sets_challenge_header() {
        let response = AuthError::NotAuthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");

        let response = AuthError::CsrfMismatch.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_password_error_status() {
        assert_eq!(
            AuthError::Password(PasswordError::NoNumber).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Password(PasswordError::HashingFailed).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
