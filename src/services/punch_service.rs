use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::models::{CreatePunchRequest, Punch};
use crate::services::analytics_service::AnalyticsService;
use crate::services::cache_service::{keys, CacheService};
use crate::services::segmentation::containing_segment;
use crate::services::session_service::SessionService;
use crate::services::workout_service::WorkoutService;

pub(crate) const PUNCH_COLUMNS: &str =
    "id, user_id, session_id, workout_id, segment_id, punch_type, speed, count, timestamp, notes";

#[derive(Debug, Clone)]
pub struct PunchService {
    db: PgPool,
    cache: CacheService,
    metrics: Arc<Metrics>,
    sessions: SessionService,
    workouts: WorkoutService,
    analytics: AnalyticsService,
}

impl PunchService {
    pub fn new(
        db: PgPool,
        cache: CacheService,
        metrics: Arc<Metrics>,
        sessions: SessionService,
        workouts: WorkoutService,
        analytics: AnalyticsService,
    ) -> Self {
        Self {
            db,
            cache,
            metrics,
            sessions,
            workouts,
            analytics,
        }
    }

    /// Log a punch. Without an explicit session or workout the punch joins
    /// the user's active workout, if any.
    pub async fn create_punch(&self, user_id: i64, request: CreatePunchRequest) -> AppResult<Punch> {
        let session = match request.session_id {
            Some(session_id) => Some(
                self.sessions
                    .find_owned(user_id, session_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Session not found"))?,
            ),
            None => None,
        };

        let workout = match request.workout_id {
            Some(workout_id) => Some(
                self.workouts
                    .find_owned(user_id, workout_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Workout not found"))?,
            ),
            None if session.is_none() => self.workouts.active_workout(user_id).await?,
            None => None,
        };

        let timestamp = request.timestamp.unwrap_or_else(Utc::now);

        let segment_id = match &workout {
            Some(workout) => {
                let segments = self.workouts.segments(workout.id).await?;
                containing_segment(timestamp, &segments)
            }
            None => None,
        };

        let punch = sqlx::query_as::<_, Punch>(&format!(
            "INSERT INTO punches (user_id, session_id, workout_id, segment_id, punch_type, speed, count, timestamp, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            PUNCH_COLUMNS
        ))
        .bind(user_id)
        .bind(session.as_ref().map(|s| s.id))
        .bind(workout.as_ref().map(|w| w.id))
        .bind(segment_id)
        .bind(&request.punch_type)
        .bind(request.speed)
        .bind(request.count)
        .bind(timestamp)
        .bind(request.notes.as_deref())
        .fetch_one(&self.db)
        .await?;

        self.metrics.record_punch_logged(&punch.punch_type);

        let mut stale = vec![keys::weekly(user_id)];
        if let Some(workout_id) = punch.workout_id {
            stale.push(keys::workout_summary(workout_id));
        }
        self.cache.delete(&stale).await;

        if let Some(session) = &session {
            if let Err(e) = self.analytics.refresh_session_analytics(session).await {
                tracing::warn!(session_id = session.id, "Failed to refresh session analytics: {}", e);
            }
        }

        tracing::debug!(punch_id = punch.id, user_id, punch_type = %punch.punch_type, "Punch logged");
        Ok(punch)
    }

    pub async fn list_session_punches(&self, user_id: i64, session_id: i64) -> AppResult<Vec<Punch>> {
        self.sessions.get_session(user_id, session_id).await?;

        let punches = sqlx::query_as::<_, Punch>(&format!(
            "SELECT {} FROM punches
             WHERE session_id = $1 AND user_id = $2
             ORDER BY timestamp, id",
            PUNCH_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(punches)
    }
}
