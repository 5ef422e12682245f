use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{CreateSessionRequest, Pagination, Session, SessionList, UpdateSessionRequest};

const SESSION_COLUMNS: &str = "id, user_id, name, started_at, ended_at";

#[derive(Debug, Clone)]
pub struct SessionService {
    db: PgPool,
}

impl SessionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_sessions(&self, user_id: i64, page: Pagination) -> AppResult<SessionList> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        let sessions = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions
             WHERE user_id = $1
             ORDER BY started_at DESC, id DESC
             LIMIT $2 OFFSET $3",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(SessionList {
            sessions,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    pub async fn create_session(&self, user_id: i64, request: CreateSessionRequest) -> AppResult<Session> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "INSERT INTO sessions (user_id, name) VALUES ($1, $2) RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(&request.name)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(session_id = session.id, user_id, "Session created");
        Ok(session)
    }

    /// Owned session or `None`; other users' sessions are indistinguishable from missing ones
    pub async fn find_owned(&self, user_id: i64, session_id: i64) -> AppResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE id = $1 AND user_id = $2",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(session)
    }

    pub async fn get_session(&self, user_id: i64, session_id: i64) -> AppResult<Session> {
        self.find_owned(user_id, session_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session not found"))
    }

    pub async fn update_session(
        &self,
        user_id: i64,
        session_id: i64,
        request: UpdateSessionRequest,
    ) -> AppResult<Session> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "UPDATE sessions
             SET name = COALESCE($3, name),
                 ended_at = COALESCE($4, ended_at)
             WHERE id = $1 AND user_id = $2
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .bind(request.name.as_deref())
        .bind(request.ended_at)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Session not found"))?;

        Ok(session)
    }
}
