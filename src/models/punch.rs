use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Punch {
    pub id: i64,
    pub user_id: i64,
    pub session_id: Option<i64>,
    pub workout_id: Option<i64>,
    pub segment_id: Option<i64>,
    pub punch_type: String,
    pub speed: f64,
    pub count: i32,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

fn default_count() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePunchRequest {
    pub session_id: Option<i64>,
    pub workout_id: Option<i64>,
    #[validate(length(min = 1, max = 20, message = "punch_type must be between 1 and 20 characters"))]
    pub punch_type: String,
    #[validate(range(min = 0.0, message = "speed must not be negative"))]
    pub speed: f64,
    #[serde(default = "default_count")]
    #[validate(range(min = 1, message = "count must be at least 1"))]
    pub count: i32,
    pub notes: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Count-weighted punch totals over an arbitrary filter
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct PunchAggregate {
    pub total_punches: i64,
    pub avg_speed: Option<f64>,
}

impl PunchAggregate {
    pub fn average_speed(&self) -> f64 {
        self.avg_speed.unwrap_or(0.0)
    }
}

/// Per-type breakdown row
#[derive(Debug, Clone, FromRow)]
pub struct PunchTypeCount {
    pub punch_type: String,
    pub total: i64,
}
