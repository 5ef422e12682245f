use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionAnalytics {
    pub session_id: i64,
    pub total_punches: i64,
    pub average_speed: f64,
    pub punch_types: BTreeMap<String, i64>,
    pub session_duration_minutes: Option<f64>,
    pub ml_classification: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct WeekStats {
    pub total_punches: i64,
    pub avg_speed: f64,
    pub sessions_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SparklinePoint {
    pub date: String,
    pub total_punches: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyAnalytics {
    pub this_week: WeekStats,
    pub last_week: WeekStats,
    pub delta_percent: f64,
    pub sparkline_data: Vec<SparklinePoint>,
    pub fatigue_proxy: Option<f64>,
}
