use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CoachInviteRequest {
    #[validate(email(message = "Invalid email address"))]
    pub athlete_email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CoachInviteResponse {
    pub invite_code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AcceptInviteRequest {
    pub invite_code: String,
}

/// One linked athlete with stats over the trailing week
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AthleteSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub total_punches: i64,
    pub average_speed: f64,
    pub sessions_count: i64,
    pub last_session_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CoachAthletesResponse {
    pub athletes: Vec<AthleteSummary>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LeaderboardQuery {
    #[serde(default = "default_range")]
    pub range: String,
}

fn default_range() -> String {
    "week".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub athlete_id: i64,
    pub athlete_name: String,
    pub total_punches: i64,
    pub avg_speed: f64,
    pub rank: usize,
    pub daily_punches: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
}
