use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::service::USER_COLUMNS;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::models::{
    DeliveryResults, NotificationPrefs, NotificationPrefsResponse, PunchAggregate, TestNotificationResponse,
    UpdateNotificationPrefs, User, WeeklyReport,
};
use crate::services::analytics_service::{round_to, AnalyticsService};
use crate::services::email_service::{weekly_report_email, EmailService};

const WEBHOOK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const PREFS_COLUMNS: &str = "id, user_id, email_enabled, webhook_enabled, webhook_url, created_at, updated_at";

/// Change against the prior week, one decimal; zero when the prior week is empty
pub fn report_change_percent(this_week: i64, last_week: i64) -> f64 {
    if last_week > 0 {
        round_to((this_week - last_week) as f64 / last_week as f64 * 100.0, 1)
    } else {
        0.0
    }
}

/// Assemble the weekly report from raw weekly figures
pub fn build_weekly_report(
    this_week: PunchAggregate,
    last_week: PunchAggregate,
    workouts_count: i64,
    best_session_punches: i64,
    week_end: DateTime<Utc>,
) -> WeeklyReport {
    WeeklyReport {
        total_punches: this_week.total_punches,
        avg_speed: round_to(this_week.average_speed(), 2),
        workouts_count,
        best_session_punches,
        change_percent: report_change_percent(this_week.total_punches, last_week.total_punches),
        week_start: week_end - Duration::days(7),
        week_end,
    }
}

/// Webhook receivers acknowledge with 200, 201 or 202
pub fn is_webhook_success(status: u16) -> bool {
    matches!(status, 200 | 201 | 202)
}

#[derive(Debug, Clone)]
pub struct NotificationService {
    db: PgPool,
    email: Arc<EmailService>,
    analytics: AnalyticsService,
    metrics: Arc<Metrics>,
    http: reqwest::Client,
}

impl NotificationService {
    pub fn new(db: PgPool, email: Arc<EmailService>, analytics: AnalyticsService, metrics: Arc<Metrics>) -> Self {
        Self {
            db,
            email,
            analytics,
            metrics,
            http: reqwest::Client::new(),
        }
    }

    async fn find_prefs(&self, user_id: i64) -> AppResult<Option<NotificationPrefs>> {
        let prefs = sqlx::query_as::<_, NotificationPrefs>(&format!(
            "SELECT {} FROM notification_prefs WHERE user_id = $1",
            PREFS_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(prefs)
    }

    pub async fn get_prefs(&self, user_id: i64) -> AppResult<NotificationPrefsResponse> {
        Ok(self
            .find_prefs(user_id)
            .await?
            .map(NotificationPrefsResponse::from)
            .unwrap_or_default())
    }

    /// Upsert; absent fields keep their stored (or default) value
    pub async fn update_prefs(
        &self,
        user_id: i64,
        update: UpdateNotificationPrefs,
    ) -> AppResult<NotificationPrefsResponse> {
        let prefs = sqlx::query_as::<_, NotificationPrefs>(&format!(
            "INSERT INTO notification_prefs (user_id, email_enabled, webhook_enabled, webhook_url)
             VALUES ($1, COALESCE($2, TRUE), COALESCE($3, FALSE), $4)
             ON CONFLICT (user_id) DO UPDATE SET
                 email_enabled = COALESCE($2, notification_prefs.email_enabled),
                 webhook_enabled = COALESCE($3, notification_prefs.webhook_enabled),
                 webhook_url = COALESCE($4, notification_prefs.webhook_url),
                 updated_at = NOW()
             RETURNING {}",
            PREFS_COLUMNS
        ))
        .bind(user_id)
        .bind(update.email_enabled)
        .bind(update.webhook_enabled)
        .bind(update.webhook_url.as_deref())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(user_id, "Notification preferences updated");
        Ok(prefs.into())
    }

    /// Report over the trailing 7 days compared with the 7 days before
    pub async fn weekly_report(&self, user_id: i64) -> AppResult<WeeklyReport> {
        let now = Utc::now();
        let week_start = now - Duration::days(7);

        let this_week = self.analytics.punch_aggregate(user_id, week_start, now).await?;
        let last_week = self
            .analytics
            .punch_aggregate(user_id, week_start - Duration::days(7), week_start)
            .await?;

        let workouts_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM workouts WHERE user_id = $1 AND started_at >= $2 AND started_at < $3",
        )
        .bind(user_id)
        .bind(week_start)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        let best_session_punches = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(total), 0)::BIGINT FROM (
                 SELECT SUM(count) AS total FROM punches
                 WHERE user_id = $1 AND workout_id IS NOT NULL
                   AND timestamp >= $2 AND timestamp < $3
                 GROUP BY workout_id
             ) per_workout",
        )
        .bind(user_id)
        .bind(week_start)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        Ok(build_weekly_report(this_week, last_week, workouts_count, best_session_punches, now))
    }

    pub async fn send_email_report(&self, user: &User, report: &WeeklyReport) -> bool {
        let email = weekly_report_email(&user.username, report);

        match self.email.send(&user.email, &email).await {
            Ok(_) => {
                self.metrics.record_notification_sent("email", "success");
                true
            }
            Err(e) => {
                tracing::error!(user_id = user.id, "Failed to send weekly report email: {}", e);
                self.metrics.record_notification_sent("email", "failure");
                false
            }
        }
    }

    pub async fn send_webhook_report(&self, url: &str, user: &User, report: &WeeklyReport) -> bool {
        let payload = json!({
            "user": {"username": user.username, "email": user.email},
            "report": report,
        });

        let outcome = self
            .http
            .post(url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&payload)
            .send()
            .await;

        let delivered = match outcome {
            Ok(response) if is_webhook_success(response.status().as_u16()) => true,
            Ok(response) => {
                tracing::warn!(user_id = user.id, status = %response.status(), "Webhook rejected weekly report");
                false
            }
            Err(e) => {
                tracing::error!(user_id = user.id, "Webhook delivery failed: {}", e);
                false
            }
        };

        self.metrics
            .record_notification_sent("webhook", if delivered { "success" } else { "failure" });
        delivered
    }

    /// Send through every enabled channel. Missing preferences mean email only.
    pub async fn deliver_report(
        &self,
        user: &User,
        prefs: Option<&NotificationPrefs>,
        report: &WeeklyReport,
    ) -> DeliveryResults {
        let mut results = DeliveryResults::default();

        if prefs.map_or(true, |p| p.email_enabled) {
            if self.send_email_report(user, report).await {
                results.emails_sent += 1;
            } else {
                results.errors += 1;
            }
        }

        if let Some(url) = prefs.and_then(NotificationPrefs::active_webhook) {
            if self.send_webhook_report(url, user, report).await {
                results.webhooks_sent += 1;
            } else {
                results.errors += 1;
            }
        }

        results
    }

    pub async fn send_test_notification(&self, user: &User) -> AppResult<TestNotificationResponse> {
        if !user.email_verified {
            return Err(AppError::bad_request("Email must be verified to receive notifications"));
        }

        let prefs = self.find_prefs(user.id).await?;
        let report = self.weekly_report(user.id).await?;
        let results = self.deliver_report(user, prefs.as_ref(), &report).await;

        Ok(TestNotificationResponse {
            message: "Test notification sent".to_string(),
            results,
        })
    }

    /// Weekly job body: every verified user with at least one channel on.
    /// A failure for one user is counted and the run moves on.
    pub async fn send_weekly_reports(&self) -> AppResult<DeliveryResults> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users u
             WHERE u.email_verified
               AND EXISTS (
                   SELECT 1 FROM notification_prefs np
                   WHERE np.user_id = u.id
                     AND (np.email_enabled OR (np.webhook_enabled AND np.webhook_url IS NOT NULL))
               )
             ORDER BY u.id",
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        let mut totals = DeliveryResults::default();

        for user in &users {
            let outcome = async {
                let prefs = self.find_prefs(user.id).await?;
                let report = self.weekly_report(user.id).await?;
                Ok::<_, AppError>(self.deliver_report(user, prefs.as_ref(), &report).await)
            }
            .await;

            match outcome {
                Ok(results) => totals.merge(results),
                Err(e) => {
                    tracing::error!(user_id = user.id, "Failed to build weekly report: {}", e);
                    totals.errors += 1;
                }
            }
        }

        tracing::info!(
            users = users.len(),
            emails_sent = totals.emails_sent,
            webhooks_sent = totals.webhooks_sent,
            errors = totals.errors,
            "Weekly reports sent"
        );

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn aggregate(total_punches: i64, avg_speed: Option<f64>) -> PunchAggregate {
        PunchAggregate {
            total_punches,
            avg_speed,
        }
    }

    #[test]
    fn test_build_weekly_report() {
        let week_end = Utc.with_ymd_and_hms(2024, 5, 8, 9, 0, 0).unwrap();
        let report = build_weekly_report(aggregate(300, Some(21.456)), aggregate(200, Some(19.0)), 3, 150, week_end);

        assert_eq!(
            report,
            WeeklyReport {
                total_punches: 300,
                avg_speed: 21.46,
                workouts_count: 3,
                best_session_punches: 150,
                change_percent: 50.0,
                week_start: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
                week_end,
            }
        );
    }

    #[test]
    fn test_report_for_idle_week() {
        let report = build_weekly_report(aggregate(0, None), aggregate(0, None), 0, 0, Utc::now());

        assert_eq!(report.avg_speed, 0.0);
        assert_eq!(report.change_percent, 0.0);
    }

    #[test]
    fn test_first_active_week_reports_no_change() {
        let report = build_weekly_report(aggregate(40, Some(18.0)), aggregate(0, None), 1, 40, Utc::now());
        assert_eq!(report.change_percent, 0.0);
    }

    #[test]
    fn test_report_change_percent() {
        assert_eq!(report_change_percent(150, 200), -25.0);
        assert_eq!(report_change_percent(1, 3), -66.7);
        assert_eq!(report_change_percent(40, 0), 0.0);
    }

    #[test]
    fn test_webhook_success_codes() {
        assert!(is_webhook_success(200));
        assert!(is_webhook_success(201));
        assert!(is_webhook_success(202));
        assert!(!is_webhook_success(204));
        assert!(!is_webhook_success(500));
    }
}
