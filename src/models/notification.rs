use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationPrefs {
    pub id: i64,
    pub user_id: i64,
    pub email_enabled: bool,
    pub webhook_enabled: bool,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPrefs {
    /// Webhook URL when the channel is switched on and configured
    pub fn active_webhook(&self) -> Option<&str> {
        if self.webhook_enabled {
            self.webhook_url.as_deref().filter(|url| !url.is_empty())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPrefsResponse {
    pub email_enabled: bool,
    pub webhook_enabled: bool,
    pub webhook_url: Option<String>,
}

impl Default for NotificationPrefsResponse {
    fn default() -> Self {
        Self {
            email_enabled: true,
            webhook_enabled: false,
            webhook_url: None,
        }
    }
}

impl From<NotificationPrefs> for NotificationPrefsResponse {
    fn from(prefs: NotificationPrefs) -> Self {
        Self {
            email_enabled: prefs.email_enabled,
            webhook_enabled: prefs.webhook_enabled,
            webhook_url: prefs.webhook_url,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateNotificationPrefs {
    pub email_enabled: Option<bool>,
    pub webhook_enabled: Option<bool>,
    #[validate(url(message = "webhook_url must be a valid URL"), length(max = 500))]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyReport {
    pub total_punches: i64,
    pub avg_speed: f64,
    pub workouts_count: i64,
    pub best_session_punches: i64,
    pub change_percent: f64,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryResults {
    pub emails_sent: u32,
    pub webhooks_sent: u32,
    pub errors: u32,
}

impl DeliveryResults {
    pub fn merge(&mut self, other: DeliveryResults) {
        self.emails_sent += other.emails_sent;
        self.webhooks_sent += other.webhooks_sent;
        self.errors += other.errors;
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TestNotificationResponse {
    pub message: String,
    pub results: DeliveryResults,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(webhook_enabled: bool, webhook_url: Option<&str>) -> NotificationPrefs {
        NotificationPrefs {
            id: 1,
            user_id: 1,
            email_enabled: true,
            webhook_enabled,
            webhook_url: webhook_url.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_active_webhook() {
        assert_eq!(prefs(true, Some("https://hooks.example.com")).active_webhook(), Some("https://hooks.example.com"));
        assert_eq!(prefs(false, Some("https://hooks.example.com")).active_webhook(), None);
        assert_eq!(prefs(true, None).active_webhook(), None);
        assert_eq!(prefs(true, Some("")).active_webhook(), None);
    }

    #[test]
    fn test_results_merge() {
        let mut total = DeliveryResults::default();
        total.merge(DeliveryResults { emails_sent: 1, webhooks_sent: 0, errors: 1 });
        total.merge(DeliveryResults { emails_sent: 1, webhooks_sent: 1, errors: 0 });

        assert_eq!(total, DeliveryResults { emails_sent: 2, webhooks_sent: 1, errors: 1 });
    }

    #[test]
    fn test_webhook_url_validation() {
        let update = UpdateNotificationPrefs {
            webhook_url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
