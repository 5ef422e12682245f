use sqlx::PgPool;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthError, JwtService, LoginRequest, SignupRequest, TokenResponse};
use crate::auth::tokens::generate_csrf_token;
use crate::models::User;

pub(crate) const USER_COLUMNS: &str = "id, username, email, password_hash, role, email_verified, created_at";

#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    db: PgPool,
}

impl AuthService {
    pub fn new(db: PgPool, jwt_service: JwtService) -> Self {
        Self { jwt_service, db }
    }

    /// Register a new user together with default notification preferences
    pub async fn signup(&self, request: SignupRequest) -> Result<User, AuthError> {
        if let Some(existing) = self.find_user_by_email_or_username(&request.email, &request.username).await? {
            return Err(if existing.email == request.email {
                AuthError::EmailAlreadyExists
            } else {
                AuthError::UsernameTaken
            });
        }

        let password_hash = hash_password(&request.password)?;

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&request.username)
        .bind(&request.email)
        .bind(&password_hash)
        .bind(request.role)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        sqlx::query(
            "INSERT INTO notification_prefs (user_id, email_enabled, webhook_enabled)
             VALUES ($1, TRUE, FALSE)",
        )
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = user.id, role = user.role.as_str(), "User registered");
        Ok(user)
    }

    /// Verify credentials and issue an access token plus a CSRF token
    pub async fn login(&self, request: &LoginRequest) -> Result<(User, TokenResponse), AuthError> {
        let user = self
            .find_user_by_email(&request.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.jwt_service.create_access_token(user.id, user.role)?;

        let response = TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            csrf_token: generate_csrf_token(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        };

        tracing::info!(user_id = user.id, "User logged in");
        Ok((user, response))
    }

    pub async fn find_user(&self, user_id: i64) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1 OR username = $2
             ORDER BY (email = $1) DESC
             LIMIT 1",
            USER_COLUMNS
        ))
        .bind(email)
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }
}

/// Two concurrent signups can both pass the existence check; the unique
/// constraints decide which one wins.
fn map_unique_violation(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return match db_err.constraint() {
                Some(constraint) if constraint.contains("username") => AuthError::UsernameTaken,
                _ => AuthError::EmailAlreadyExists,
            };
        }
    }
    AuthError::Database(err)
}
