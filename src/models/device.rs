use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, FromRow)]
pub struct ApiKey {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub secret_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
}

/// Returned once at creation; the plaintext secret is not stored
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyCreated {
    pub id: i64,
    pub name: String,
    pub secret: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ApiKeySummary {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

fn default_count() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeviceEvent {
    #[validate(length(min = 1, max = 20, message = "punch_type must be between 1 and 20 characters"))]
    pub punch_type: String,
    #[validate(range(min = 0.0, message = "speed must not be negative"))]
    pub speed: f64,
    #[serde(default = "default_count")]
    #[validate(range(min = 1, message = "count must be at least 1"))]
    pub count: i32,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeviceIngestRequest {
    pub user_api_key: String,
    #[validate(nested)]
    pub events: Vec<DeviceEvent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResult {
    pub workout_id: i64,
    pub punches_created: usize,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_request_parsing() {
        let body = r#"{
            "user_api_key": "pt_secret",
            "events": [
                {"punch_type": "jab", "speed": 18.5, "ts": "2024-05-01T10:00:00Z"},
                {"punch_type": "hook", "speed": 22.0, "count": 3, "ts": "2024-05-01T10:00:02Z"}
            ]
        }"#;

        let request: DeviceIngestRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.events.len(), 2);
        assert_eq!(request.events[0].count, 1);
        assert_eq!(request.events[1].count, 3);
        assert!(request.validate().is_ok());
    }

    fn event(punch_type: &str, speed: f64, count: i32) -> DeviceEvent {
        DeviceEvent {
            punch_type: punch_type.to_string(),
            speed,
            count,
            ts: Utc::now(),
        }
    }

    fn request(events: Vec<DeviceEvent>) -> DeviceIngestRequest {
        DeviceIngestRequest {
            user_api_key: "pt_secret".to_string(),
            events,
        }
    }

    #[test]
    fn test_event_rules_reach_nested_events() {
        let errors = request(vec![event("jab", 10.0, 1), event("jab", 10.0, 0)])
            .validate()
            .unwrap_err();

        assert!(errors.errors().contains_key("events"));
        assert!(errors.to_string().contains("count must be at least 1"), "{}", errors);
    }

    #[test]
    fn test_event_rules_match_punch_requests() {
        assert!(request(vec![event("", 10.0, 1)]).validate().is_err());
        assert!(request(vec![event(&"x".repeat(21), 10.0, 1)]).validate().is_err());
        assert!(request(vec![event("hook", -1.0, 1)]).validate().is_err());
        assert!(request(vec![event(&"x".repeat(20), 0.0, 1)]).validate().is_ok());
        assert!(request(Vec::new()).validate().is_ok());
    }
}
