use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::password::hash_password;
use crate::auth::tokens::{generate_token, hash_token};
use crate::auth::{AuthError, AuthService, MessageResponse};
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::services::email_service::{password_reset_email, verify_email_email, EmailService, RenderedEmail};

pub const FORGOT_PASSWORD_MESSAGE: &str = "If the email exists, a reset link has been sent";

/// Single-use emailed tokens, stored only as sha256 digests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    EmailVerify,
    PasswordReset,
}

impl TokenKind {
    fn table(self) -> &'static str {
        match self {
            TokenKind::EmailVerify => "email_verify_tokens",
            TokenKind::PasswordReset => "password_reset_tokens",
        }
    }

    fn path(self) -> &'static str {
        match self {
            TokenKind::EmailVerify => "/auth/verify",
            TokenKind::PasswordReset => "/auth/reset",
        }
    }

    fn ttl_minutes(self, config: &AuthConfig) -> i64 {
        match self {
            TokenKind::EmailVerify => config.email_verify_ttl_minutes,
            TokenKind::PasswordReset => config.password_reset_ttl_minutes,
        }
    }
}

/// Link placed in the email body
pub fn action_url(frontend_url: &str, kind: TokenKind, token: &str) -> String {
    format!("{}{}?token={}", frontend_url.trim_end_matches('/'), kind.path(), token)
}

#[derive(Debug, Clone)]
pub struct AuthFlowService {
    db: PgPool,
    auth: AuthService,
    email: Arc<EmailService>,
    config: AuthConfig,
    frontend_url: String,
}

impl AuthFlowService {
    pub fn new(
        db: PgPool,
        auth: AuthService,
        email: Arc<EmailService>,
        config: AuthConfig,
        frontend_url: String,
    ) -> Self {
        Self {
            db,
            auth,
            email,
            config,
            frontend_url,
        }
    }

    /// Replace any outstanding token of this kind and return the plaintext
    async fn issue_token(&self, user_id: i64, kind: TokenKind) -> AppResult<String> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::minutes(kind.ttl_minutes(&self.config));

        let mut tx = self.db.begin().await?;

        sqlx::query(&format!("DELETE FROM {} WHERE user_id = $1", kind.table()))
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!(
            "INSERT INTO {} (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
            kind.table()
        ))
        .bind(user_id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(token)
    }

    /// Mark a live token used and return its owner
    async fn consume_token(&self, kind: TokenKind, token: &str) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(&format!(
            "UPDATE {} SET used_at = NOW()
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
             RETURNING user_id",
            kind.table()
        ))
        .bind(hash_token(token))
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidOrExpiredToken))
    }

    async fn deliver(&self, user: &User, email: &RenderedEmail) -> AppResult<()> {
        self.email
            .send(&user.email, email)
            .await
            .map(|_| ())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to send email to user {}: {}", user.id, e)))
    }

    pub async fn send_verification(&self, user: &User) -> AppResult<()> {
        let token = self.issue_token(user.id, TokenKind::EmailVerify).await?;
        let url = action_url(&self.frontend_url, TokenKind::EmailVerify, &token);
        let email = verify_email_email(&user.username, &url, self.config.email_verify_ttl_minutes);

        self.deliver(user, &email).await?;
        tracing::info!(user_id = user.id, "Verification email sent");
        Ok(())
    }

    pub async fn resend_verification(&self, user: &User) -> AppResult<MessageResponse> {
        if user.email_verified {
            return Err(AppError::bad_request("Email already verified"));
        }

        self.send_verification(user).await?;
        Ok(MessageResponse::new("Verification email sent"))
    }

    pub async fn verify_email(&self, token: &str) -> AppResult<MessageResponse> {
        let user_id = self.consume_token(TokenKind::EmailVerify, token).await?;

        sqlx::query("UPDATE users SET email_verified = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id, "Email verified");
        Ok(MessageResponse::new("Email verified successfully"))
    }

    /// Same answer whether or not the address is registered
    pub async fn forgot_password(&self, email: &str) -> AppResult<MessageResponse> {
        if let Some(user) = self.auth.find_user_by_email(email).await? {
            let token = self.issue_token(user.id, TokenKind::PasswordReset).await?;
            let url = action_url(&self.frontend_url, TokenKind::PasswordReset, &token);
            let message = password_reset_email(&user.username, &url, self.config.password_reset_ttl_minutes);

            self.deliver(&user, &message).await?;
            tracing::info!(user_id = user.id, "Password reset email sent");
        }

        Ok(MessageResponse::new(FORGOT_PASSWORD_MESSAGE))
    }

    /// The new password is checked before the token is spent
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<MessageResponse> {
        let password_hash = hash_password(new_password)?;
        let user_id = self.consume_token(TokenKind::PasswordReset, token).await?;

        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(&password_hash)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id, "Password reset");
        Ok(MessageResponse::new("Password reset successfully"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_urls() {
        assert_eq!(
            action_url("http://localhost:3000", TokenKind::EmailVerify, "abc"),
            "http://localhost:3000/auth/verify?token=abc"
        );
        assert_eq!(
            action_url("https://app.example.com/", TokenKind::PasswordReset, "xyz"),
            "https://app.example.com/auth/reset?token=xyz"
        );
    }

    #[test]
    fn test_token_ttls_follow_config() {
        let config = AuthConfig {
            email_verify_ttl_minutes: 30,
            password_reset_ttl_minutes: 15,
            ..crate::config::AppConfig::default().auth
        };

        assert_eq!(TokenKind::EmailVerify.ttl_minutes(&config), 30);
        assert_eq!(TokenKind::PasswordReset.ttl_minutes(&config), 15);
        assert_ne!(TokenKind::EmailVerify.table(), TokenKind::PasswordReset.table());
    }
}
