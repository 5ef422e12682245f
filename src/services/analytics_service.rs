use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::models::{
    PunchAggregate, PunchTypeCount, Session, SessionAnalytics, SparklinePoint, WeekStats, WeeklyAnalytics,
};
use crate::services::cache_service::{keys, CacheService, SESSION_STATS_TTL_SECS, WEEKLY_TTL_SECS};

const SPARKLINE_WEEKS: i64 = 4;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Week-over-week change in percent, one decimal
pub fn delta_percent(this_week: i64, last_week: i64) -> f64 {
    if last_week > 0 {
        round_to((this_week - last_week) as f64 / last_week as f64 * 100.0, 1)
    } else if this_week > 0 {
        100.0
    } else {
        0.0
    }
}

/// Negative least-squares slope of speed over punch index. Positive values
/// mean the athlete slowed down across the workout.
pub fn fatigue_proxy(speeds: &[f64]) -> Option<f64> {
    let n = speeds.len();
    if n < 2 {
        return None;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = speeds.iter().sum::<f64>() / n as f64;

    let (numerator, denominator) = speeds.iter().enumerate().fold((0.0, 0.0), |(num, den), (i, y)| {
        let dx = i as f64 - x_mean;
        (num + dx * (y - y_mean), den + dx * dx)
    });

    if denominator == 0.0 {
        return None;
    }

    let slope = numerator / denominator;
    if slope == 0.0 {
        return None;
    }

    Some(round_to(-slope, 3))
}

/// Speed-band heuristic over the count-weighted average speed (mph)
pub fn classify_skill(average_speed: f64, total_punches: i64) -> &'static str {
    if total_punches == 0 {
        return "Beginner";
    }
    match average_speed {
        s if s < 15.0 => "Beginner",
        s if s < 22.0 => "Intermediate",
        s if s < 30.0 => "Advanced",
        _ => "Professional",
    }
}

/// `(start, end)` of sparkline bucket `i`, newest first
pub fn sparkline_window(now: DateTime<Utc>, i: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    (now - Duration::days(7 * (i + 1)), now - Duration::days(7 * i))
}

#[derive(Debug, Clone)]
pub struct AnalyticsService {
    db: PgPool,
    cache: CacheService,
}

impl AnalyticsService {
    pub fn new(db: PgPool, cache: CacheService) -> Self {
        Self { db, cache }
    }

    /// Ownership is checked before the cache so a cached entry never leaks
    /// another user's session.
    pub async fn session_analytics(&self, user_id: i64, session_id: i64) -> AppResult<SessionAnalytics> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, name, started_at, ended_at FROM sessions WHERE id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Session not found"))?;

        if let Some(cached) = self.cache.get_json::<SessionAnalytics>(&keys::session_stats(session_id)).await {
            return Ok(cached);
        }

        self.refresh_session_analytics(&session).await
    }

    /// Recompute a session's analytics from the database and store them
    pub async fn refresh_session_analytics(&self, session: &Session) -> AppResult<SessionAnalytics> {
        let aggregate = sqlx::query_as::<_, PunchAggregate>(
            "SELECT COALESCE(SUM(count), 0)::BIGINT AS total_punches,
                    SUM(speed * count) / NULLIF(SUM(count), 0) AS avg_speed
             FROM punches WHERE session_id = $1",
        )
        .bind(session.id)
        .fetch_one(&self.db)
        .await?;

        let punch_types = sqlx::query_as::<_, PunchTypeCount>(
            "SELECT punch_type, COALESCE(SUM(count), 0)::BIGINT AS total
             FROM punches WHERE session_id = $1
             GROUP BY punch_type",
        )
        .bind(session.id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|row| (row.punch_type, row.total))
        .collect::<BTreeMap<_, _>>();

        let average_speed = round_to(aggregate.average_speed(), 2);
        let analytics = SessionAnalytics {
            session_id: session.id,
            total_punches: aggregate.total_punches,
            average_speed,
            punch_types,
            session_duration_minutes: session
                .ended_at
                .map(|end| (end - session.started_at).num_milliseconds() as f64 / 60_000.0),
            ml_classification: classify_skill(average_speed, aggregate.total_punches).to_string(),
        };

        self.cache
            .set_json(&keys::session_stats(session.id), &analytics, SESSION_STATS_TTL_SECS)
            .await;

        Ok(analytics)
    }

    pub async fn weekly_analytics(&self, user_id: i64) -> AppResult<WeeklyAnalytics> {
        let cache_key = keys::weekly(user_id);
        if let Some(cached) = self.cache.get_json::<WeeklyAnalytics>(&cache_key).await {
            return Ok(cached);
        }

        let now = Utc::now();
        let (this_start, this_end) = sparkline_window(now, 0);
        let (last_start, last_end) = sparkline_window(now, 1);

        let this_week = self.week_stats(user_id, this_start, this_end).await?;
        let last_week = self.week_stats(user_id, last_start, last_end).await?;

        let mut sparkline_data = Vec::with_capacity(SPARKLINE_WEEKS as usize);
        for i in 0..SPARKLINE_WEEKS {
            let (start, end) = sparkline_window(now, i);
            let total_punches = match i {
                0 => this_week.total_punches,
                1 => last_week.total_punches,
                _ => self.punch_aggregate(user_id, start, end).await?.total_punches,
            };
            sparkline_data.push(SparklinePoint {
                date: end.format("%Y-%m-%d").to_string(),
                total_punches,
            });
        }

        let analytics = WeeklyAnalytics {
            this_week,
            last_week,
            delta_percent: delta_percent(this_week.total_punches, last_week.total_punches),
            sparkline_data,
            fatigue_proxy: self.latest_workout_fatigue(user_id, this_start, this_end).await?,
        };

        self.cache.set_json(&cache_key, &analytics, WEEKLY_TTL_SECS).await;
        Ok(analytics)
    }

    /// Count-weighted punch totals for a user within `[start, end)`
    pub async fn punch_aggregate(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<PunchAggregate> {
        let aggregate = sqlx::query_as::<_, PunchAggregate>(
            "SELECT COALESCE(SUM(count), 0)::BIGINT AS total_punches,
                    SUM(speed * count) / NULLIF(SUM(count), 0) AS avg_speed
             FROM punches
             WHERE user_id = $1 AND timestamp >= $2 AND timestamp < $3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await?;

        Ok(aggregate)
    }

    async fn week_stats(&self, user_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<WeekStats> {
        let aggregate = self.punch_aggregate(user_id, start, end).await?;

        let sessions_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM workouts WHERE user_id = $1 AND started_at >= $2 AND started_at < $3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await?;

        Ok(WeekStats {
            total_punches: aggregate.total_punches,
            avg_speed: round_to(aggregate.average_speed(), 2),
            sessions_count,
        })
    }

    async fn latest_workout_fatigue(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Option<f64>> {
        let latest = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM workouts
             WHERE user_id = $1 AND started_at >= $2 AND started_at < $3
             ORDER BY started_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.db)
        .await?;

        let Some(workout_id) = latest else {
            return Ok(None);
        };

        let speeds = sqlx::query_scalar::<_, f64>(
            "SELECT speed FROM punches WHERE workout_id = $1 ORDER BY timestamp, id",
        )
        .bind(workout_id)
        .fetch_all(&self.db)
        .await?;

        Ok(fatigue_proxy(&speeds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_delta_percent() {
        assert_eq!(delta_percent(150, 100), 50.0);
        assert_eq!(delta_percent(50, 100), -50.0);
        assert_eq!(delta_percent(1, 3), -66.7);
        assert_eq!(delta_percent(10, 0), 100.0);
        assert_eq!(delta_percent(0, 0), 0.0);
    }

    #[test]
    fn test_fatigue_proxy_slowing_down() {
        // Speed drops by 0.5 per punch
        let speeds = [20.0, 19.5, 19.0, 18.5, 18.0];
        assert_eq!(fatigue_proxy(&speeds), Some(0.5));
    }

    #[test]
    fn test_fatigue_proxy_speeding_up() {
        let speeds = [10.0, 12.0, 14.0];
        assert_eq!(fatigue_proxy(&speeds), Some(-2.0));
    }

    #[test]
    fn test_fatigue_proxy_degenerate_inputs() {
        assert_eq!(fatigue_proxy(&[]), None);
        assert_eq!(fatigue_proxy(&[18.0]), None);
        assert_eq!(fatigue_proxy(&[18.0, 18.0, 18.0]), None);
    }

    #[test]
    fn test_fatigue_proxy_rounding() {
        let speeds = [20.0, 19.0, 19.5];
        // slope = -0.25
        assert_eq!(fatigue_proxy(&speeds), Some(0.25));

        let speeds = [1.0, 1.1, 1.0, 1.2];
        // slope = 0.05
        assert_eq!(fatigue_proxy(&speeds), Some(-0.05));
    }

    #[test]
    fn test_classify_skill_bands() {
        assert_eq!(classify_skill(25.0, 0), "Beginner");
        assert_eq!(classify_skill(12.0, 10), "Beginner");
        assert_eq!(classify_skill(18.0, 10), "Intermediate");
        assert_eq!(classify_skill(25.0, 10), "Advanced");
        assert_eq!(classify_skill(34.0, 10), "Professional");
    }

    #[test]
    fn test_sparkline_windows() {
        let now = Utc.with_ymd_and_hms(2024, 5, 29, 12, 0, 0).unwrap();

        let (start, end) = sparkline_window(now, 0);
        assert_eq!(end, now);
        assert_eq!(start, now - Duration::days(7));

        let (start, end) = sparkline_window(now, 3);
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2024-05-08");
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2024-05-01");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(21.456, 2), 21.46);
        assert_eq!(round_to(-0.12345, 3), -0.123);
    }
}
