use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workout {
    pub id: i64,
    pub user_id: i64,
    pub name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub auto_detected: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "segment_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Active,
    Rest,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutSegment {
    pub id: i64,
    pub workout_id: i64,
    pub kind: SegmentKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub target_seconds: Option<i32>,
}

/// A segment computed in memory before it is persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewSegment {
    pub kind: SegmentKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub target_seconds: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct WorkoutTemplate {
    pub name: &'static str,
    pub rounds: u32,
    pub round_duration_seconds: i32,
    pub rest_duration_seconds: i32,
    pub description: &'static str,
}

pub const WORKOUT_TEMPLATES: [(&str, WorkoutTemplate); 4] = [
    (
        "sparring",
        WorkoutTemplate {
            name: "Sparring",
            rounds: 6,
            round_duration_seconds: 180,
            rest_duration_seconds: 60,
            description: "6 rounds of 3-minute sparring with 1-minute rest",
        },
    ),
    (
        "heavy_bag",
        WorkoutTemplate {
            name: "Heavy Bag",
            rounds: 8,
            round_duration_seconds: 180,
            rest_duration_seconds: 60,
            description: "8 rounds of 3-minute heavy bag work with 1-minute rest",
        },
    ),
    (
        "speed_bag",
        WorkoutTemplate {
            name: "Speed Bag",
            rounds: 10,
            round_duration_seconds: 120,
            rest_duration_seconds: 30,
            description: "10 rounds of 2-minute speed bag with 30-second rest",
        },
    ),
    (
        "conditioning",
        WorkoutTemplate {
            name: "Conditioning",
            rounds: 4,
            round_duration_seconds: 300,
            rest_duration_seconds: 120,
            description: "4 rounds of 5-minute conditioning with 2-minute rest",
        },
    ),
];

pub fn find_template(key: &str) -> Option<&'static WorkoutTemplate> {
    WORKOUT_TEMPLATES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, template)| template)
}

pub fn workout_templates() -> BTreeMap<&'static str, WorkoutTemplate> {
    WORKOUT_TEMPLATES.iter().copied().collect()
}

#[derive(Debug, Default, Deserialize)]
pub struct StartWorkoutRequest {
    pub template_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkoutStartResponse {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<WorkoutTemplate>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ActiveWorkout {
    pub id: i64,
    pub started_at: DateTime<Utc>,
}

impl From<&Workout> for ActiveWorkout {
    fn from(workout: &Workout) -> Self {
        Self {
            id: workout.id,
            started_at: workout.started_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkoutList {
    pub workouts: Vec<Workout>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub id: i64,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_punches: i64,
    pub average_speed: f64,
    pub duration_seconds: Option<i64>,
    pub rounds: usize,
    pub rests: usize,
    pub segments: Vec<WorkoutSegment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_lookup() {
        let heavy_bag = find_template("heavy_bag").unwrap();
        assert_eq!(heavy_bag.rounds, 8);
        assert_eq!(heavy_bag.round_duration_seconds, 180);
        assert_eq!(heavy_bag.rest_duration_seconds, 60);

        assert!(find_template("marathon").is_none());
    }

    #[test]
    fn test_templates_map_keys() {
        let templates = workout_templates();
        let keys: Vec<_> = templates.keys().copied().collect();
        assert_eq!(keys, vec!["conditioning", "heavy_bag", "sparring", "speed_bag"]);
    }

    #[test]
    fn test_segment_kind_serialization() {
        assert_eq!(serde_json::to_string(&SegmentKind::Rest).unwrap(), "\"rest\"");
    }
}
