//! Active/rest segmentation of a workout from punch timestamps, and the
//! planned layout of template workouts.

use chrono::{DateTime, Duration, Utc};

use crate::config::WorkoutConfig;
use crate::models::{NewSegment, SegmentKind, WorkoutSegment, WorkoutTemplate};

#[derive(Debug, Clone, Copy)]
pub struct SegmentationThresholds {
    /// A gap at least this long between punches is a rest
    pub rest_gap_secs: i64,
    /// Active runs shorter than this are dropped (never below one second)
    pub min_active_secs: i64,
}

impl From<&WorkoutConfig> for SegmentationThresholds {
    fn from(config: &WorkoutConfig) -> Self {
        Self {
            rest_gap_secs: config.segment_rest_min_secs,
            min_active_secs: config.segment_active_min_secs,
        }
    }
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

/// Single pass over the punch timestamps of one workout.
pub fn segment_punches(
    timestamps: &[DateTime<Utc>],
    workout_end: Option<DateTime<Utc>>,
    thresholds: SegmentationThresholds,
) -> Vec<NewSegment> {
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();

    let Some((&first, rest)) = sorted.split_first() else {
        return Vec::new();
    };

    let min_active = thresholds.min_active_secs.max(1) as f64;
    let mut segments = Vec::new();
    let mut current_start = first;
    let mut last = first;

    for &ts in rest {
        if seconds_between(last, ts) >= thresholds.rest_gap_secs as f64 {
            if seconds_between(current_start, last) >= min_active {
                segments.push(NewSegment {
                    kind: SegmentKind::Active,
                    started_at: current_start,
                    ended_at: last,
                    target_seconds: None,
                });
            }
            segments.push(NewSegment {
                kind: SegmentKind::Rest,
                started_at: last,
                ended_at: ts,
                target_seconds: None,
            });
            current_start = ts;
        }
        last = ts;
    }

    let tail_end = workout_end.map_or(last, |end| end.max(last));
    if seconds_between(current_start, tail_end) >= 1.0 {
        segments.push(NewSegment {
            kind: SegmentKind::Active,
            started_at: current_start,
            ended_at: tail_end,
            target_seconds: None,
        });
    }

    segments
}

/// Rounds back to back from `start`, with a rest between rounds but not after the last.
pub fn plan_segments(start: DateTime<Utc>, template: &WorkoutTemplate) -> Vec<NewSegment> {
    let mut segments = Vec::with_capacity(template.rounds as usize * 2);
    let mut cursor = start;

    for round in 0..template.rounds {
        let round_end = cursor + Duration::seconds(template.round_duration_seconds as i64);
        segments.push(NewSegment {
            kind: SegmentKind::Active,
            started_at: cursor,
            ended_at: round_end,
            target_seconds: Some(template.round_duration_seconds),
        });
        cursor = round_end;

        if round + 1 < template.rounds {
            let rest_end = cursor + Duration::seconds(template.rest_duration_seconds as i64);
            segments.push(NewSegment {
                kind: SegmentKind::Rest,
                started_at: cursor,
                ended_at: rest_end,
                target_seconds: Some(template.rest_duration_seconds),
            });
            cursor = rest_end;
        }
    }

    segments
}

/// Segment whose `[started_at, ended_at)` window contains `ts`
pub fn containing_segment(ts: DateTime<Utc>, segments: &[WorkoutSegment]) -> Option<i64> {
    segments
        .iter()
        .find(|segment| segment.started_at <= ts && ts < segment.ended_at)
        .map(|segment| segment.id)
}
