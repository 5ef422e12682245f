use chrono::{Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::WorkoutConfig;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::models::{
    find_template, workout_templates, ActiveWorkout, NewSegment, PunchAggregate, SegmentKind, Workout,
    WorkoutList, WorkoutSegment, WorkoutStartResponse, WorkoutSummary, WorkoutTemplate, Pagination,
};
use crate::services::analytics_service::round_to;
use crate::services::cache_service::{keys, CacheService, WORKOUT_SUMMARY_TTL_SECS};
use crate::services::segmentation::{plan_segments, segment_punches, SegmentationThresholds};

const WORKOUT_COLUMNS: &str = "id, user_id, name, started_at, ended_at, auto_detected";
const SEGMENT_COLUMNS: &str = "id, workout_id, kind, started_at, ended_at, target_seconds";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

#[derive(Debug, Clone)]
pub struct WorkoutService {
    db: PgPool,
    cache: CacheService,
    metrics: Arc<Metrics>,
    config: WorkoutConfig,
}

impl WorkoutService {
    pub fn new(db: PgPool, cache: CacheService, metrics: Arc<Metrics>, config: WorkoutConfig) -> Self {
        Self {
            db,
            cache,
            metrics,
            config,
        }
    }

    pub fn templates(&self) -> BTreeMap<&'static str, WorkoutTemplate> {
        workout_templates()
    }

    /// Start a workout, or return the one already running. A known template
    /// lays out its rounds and rests as planned segments.
    pub async fn start_workout(&self, user_id: i64, template_name: Option<&str>) -> AppResult<WorkoutStartResponse> {
        let template = template_name.and_then(find_template).copied();
        if let (Some(name), None) = (template_name, template) {
            tracing::warn!(user_id, template = name, "Unknown workout template, starting a free workout");
        }

        if let Some(active) = self.active_workout(user_id).await? {
            return Ok(WorkoutStartResponse {
                id: active.id,
                started_at: active.started_at,
                template,
            });
        }

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query_as::<_, Workout>(&format!(
            "INSERT INTO workouts (user_id, name, auto_detected) VALUES ($1, $2, FALSE) RETURNING {}",
            WORKOUT_COLUMNS
        ))
        .bind(user_id)
        .bind(template.map(|t| t.name))
        .fetch_one(&mut *tx)
        .await;

        let workout = match inserted {
            Ok(workout) => workout,
            Err(err) if is_unique_violation(&err) => {
                // Lost the race against a concurrent start
                drop(tx);
                let active = self
                    .active_workout(user_id)
                    .await?
                    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("active workout vanished during start")))?;
                return Ok(WorkoutStartResponse {
                    id: active.id,
                    started_at: active.started_at,
                    template,
                });
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(template) = &template {
            let planned = plan_segments(workout.started_at, template);
            insert_segments(&mut tx, workout.id, &planned).await?;
        }

        tx.commit().await?;

        let label = match (template_name, template) {
            (Some(name), Some(_)) => name,
            _ => "none",
        };
        self.metrics.record_workout_started(label);
        self.refresh_active_gauge().await;
        self.cache.delete(&[keys::weekly(user_id)]).await;

        tracing::info!(workout_id = workout.id, user_id, template = label, "Workout started");
        Ok(WorkoutStartResponse {
            id: workout.id,
            started_at: workout.started_at,
            template,
        })
    }

    /// End the active workout; without one, hand back the most recent workout.
    pub async fn stop_workout(&self, user_id: i64) -> AppResult<ActiveWorkout> {
        let Some(active) = self.active_workout(user_id).await? else {
            let latest = sqlx::query_as::<_, Workout>(&format!(
                "SELECT {} FROM workouts WHERE user_id = $1 ORDER BY started_at DESC, id DESC LIMIT 1",
                WORKOUT_COLUMNS
            ))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::bad_request("No active workout"))?;

            return Ok(ActiveWorkout::from(&latest));
        };

        let stopped = sqlx::query_as::<_, Workout>(&format!(
            "UPDATE workouts SET ended_at = NOW() WHERE id = $1 AND ended_at IS NULL RETURNING {}",
            WORKOUT_COLUMNS
        ))
        .bind(active.id)
        .fetch_optional(&self.db)
        .await?
        .unwrap_or(active);

        self.finish_workout(&stopped).await;
        self.refresh_active_gauge().await;

        tracing::info!(workout_id = stopped.id, user_id, "Workout stopped");
        Ok(ActiveWorkout::from(&stopped))
    }

    /// Best-effort post-processing once a workout has ended
    async fn finish_workout(&self, workout: &Workout) {
        if let Err(e) = self.generate_segments(workout).await {
            tracing::warn!(workout_id = workout.id, "Failed to generate segments: {}", e);
        }
        self.cache
            .delete(&[keys::workout_summary(workout.id), keys::weekly(workout.user_id)])
            .await;
    }

    pub async fn active_workout(&self, user_id: i64) -> AppResult<Option<Workout>> {
        let workout = sqlx::query_as::<_, Workout>(&format!(
            "SELECT {} FROM workouts WHERE user_id = $1 AND ended_at IS NULL LIMIT 1",
            WORKOUT_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(workout)
    }

    pub async fn find_owned(&self, user_id: i64, workout_id: i64) -> AppResult<Option<Workout>> {
        let workout = sqlx::query_as::<_, Workout>(&format!(
            "SELECT {} FROM workouts WHERE id = $1 AND user_id = $2",
            WORKOUT_COLUMNS
        ))
        .bind(workout_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(workout)
    }

    pub async fn list_workouts(&self, user_id: i64, page: Pagination) -> AppResult<WorkoutList> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM workouts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        let workouts = sqlx::query_as::<_, Workout>(&format!(
            "SELECT {} FROM workouts
             WHERE user_id = $1
             ORDER BY started_at DESC, id DESC
             LIMIT $2 OFFSET $3",
            WORKOUT_COLUMNS
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(WorkoutList {
            workouts,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    pub async fn segments(&self, workout_id: i64) -> AppResult<Vec<WorkoutSegment>> {
        let segments = sqlx::query_as::<_, WorkoutSegment>(&format!(
            "SELECT {} FROM workout_segments WHERE workout_id = $1 ORDER BY started_at, id",
            SEGMENT_COLUMNS
        ))
        .bind(workout_id)
        .fetch_all(&self.db)
        .await?;

        Ok(segments)
    }

    pub async fn workout_summary(&self, user_id: i64, workout_id: i64) -> AppResult<WorkoutSummary> {
        let workout = self
            .find_owned(user_id, workout_id)
            .await?
            .ok_or_else(|| AppError::not_found("Workout not found"))?;

        let cache_key = keys::workout_summary(workout_id);
        if let Some(cached) = self.cache.get_json::<WorkoutSummary>(&cache_key).await {
            return Ok(cached);
        }

        let aggregate = sqlx::query_as::<_, PunchAggregate>(
            "SELECT COALESCE(SUM(count), 0)::BIGINT AS total_punches,
                    SUM(speed * count) / NULLIF(SUM(count), 0) AS avg_speed
             FROM punches WHERE workout_id = $1",
        )
        .bind(workout_id)
        .fetch_one(&self.db)
        .await?;

        let segments = self.segments(workout_id).await?;
        let summary = WorkoutSummary {
            id: workout.id,
            user_id: workout.user_id,
            started_at: workout.started_at,
            ended_at: workout.ended_at,
            total_punches: aggregate.total_punches,
            average_speed: round_to(aggregate.average_speed(), 2),
            duration_seconds: workout.ended_at.map(|end| (end - workout.started_at).num_seconds()),
            rounds: segments.iter().filter(|s| s.kind == SegmentKind::Active).count(),
            rests: segments.iter().filter(|s| s.kind == SegmentKind::Rest).count(),
            segments,
        };

        self.cache.set_json(&cache_key, &summary, WORKOUT_SUMMARY_TTL_SECS).await;
        Ok(summary)
    }

    /// Derive active/rest segments from punch gaps. Workouts that already
    /// have segments (planned or generated) are left alone.
    pub async fn generate_segments(&self, workout: &Workout) -> AppResult<usize> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM workout_segments WHERE workout_id = $1")
            .bind(workout.id)
            .fetch_one(&self.db)
            .await?;
        if existing > 0 {
            return Ok(0);
        }

        let timestamps = sqlx::query_scalar::<_, chrono::DateTime<Utc>>(
            "SELECT timestamp FROM punches WHERE workout_id = $1 ORDER BY timestamp",
        )
        .bind(workout.id)
        .fetch_all(&self.db)
        .await?;

        let segments = segment_punches(&timestamps, workout.ended_at, SegmentationThresholds::from(&self.config));
        if segments.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.begin().await?;
        insert_segments(&mut tx, workout.id, &segments).await?;

        sqlx::query(
            "UPDATE punches p SET segment_id = s.id
             FROM workout_segments s
             WHERE p.workout_id = $1 AND s.workout_id = $1
               AND p.segment_id IS NULL
               AND s.kind = 'active'
               AND p.timestamp >= s.started_at AND p.timestamp <= s.ended_at",
        )
        .bind(workout.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(workout_id = workout.id, segments = segments.len(), "Generated workout segments");
        Ok(segments.len())
    }

    /// Close auto-detected workouts with no activity for `INACTIVITY_MINUTES`.
    /// The workout ends at its last punch. Restrict to one user with `user_id`.
    pub async fn close_idle_workouts(&self, user_id: Option<i64>) -> AppResult<usize> {
        let cutoff = Utc::now() - Duration::minutes(self.config.inactivity_minutes);

        let closed = sqlx::query_as::<_, Workout>(
            "UPDATE workouts w SET ended_at = activity.last_at
             FROM (
                 SELECT w2.id, GREATEST(COALESCE(MAX(p.timestamp), w2.started_at), w2.started_at) AS last_at
                 FROM workouts w2
                 LEFT JOIN punches p ON p.workout_id = w2.id
                 WHERE w2.ended_at IS NULL AND w2.auto_detected
                   AND ($2::BIGINT IS NULL OR w2.user_id = $2)
                 GROUP BY w2.id
             ) activity
             WHERE w.id = activity.id AND activity.last_at < $1
             RETURNING w.id, w.user_id, w.name, w.started_at, w.ended_at, w.auto_detected",
        )
        .bind(cutoff)
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        for workout in &closed {
            self.finish_workout(workout).await;
            tracing::info!(workout_id = workout.id, user_id = workout.user_id, "Closed idle workout");
        }

        if !closed.is_empty() {
            self.refresh_active_gauge().await;
        }

        Ok(closed.len())
    }

    /// Workout that device events attach to: the active one, or a new
    /// auto-detected workout once any idle one has been closed.
    pub async fn get_or_start_auto_workout(&self, user_id: i64) -> AppResult<Workout> {
        self.close_idle_workouts(Some(user_id)).await?;

        if let Some(active) = self.active_workout(user_id).await? {
            return Ok(active);
        }

        let inserted = sqlx::query_as::<_, Workout>(&format!(
            "INSERT INTO workouts (user_id, auto_detected) VALUES ($1, TRUE) RETURNING {}",
            WORKOUT_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.db)
        .await;

        match inserted {
            Ok(workout) => {
                self.metrics.record_workout_started("auto");
                self.refresh_active_gauge().await;
                tracing::info!(workout_id = workout.id, user_id, "Auto-detected workout started");
                Ok(workout)
            }
            Err(err) if is_unique_violation(&err) => self
                .active_workout(user_id)
                .await?
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("active workout vanished during auto start"))),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn refresh_active_gauge(&self) {
        match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM workouts WHERE ended_at IS NULL")
            .fetch_one(&self.db)
            .await
        {
            Ok(count) => self.metrics.set_active_workouts(count),
            Err(e) => tracing::warn!("Failed to refresh active workout gauge: {}", e),
        }
    }
}

async fn insert_segments(
    tx: &mut Transaction<'_, Postgres>,
    workout_id: i64,
    segments: &[NewSegment],
) -> AppResult<()> {
    for segment in segments {
        sqlx::query(
            "INSERT INTO workout_segments (workout_id, kind, started_at, ended_at, target_seconds)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(workout_id)
        .bind(segment.kind)
        .bind(segment.started_at)
        .bind(segment.ended_at)
        .bind(segment.target_seconds)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
