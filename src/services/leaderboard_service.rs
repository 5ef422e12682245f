use chrono::{Duration, Utc};
use sqlx::{FromRow, PgPool};

use crate::error::{AppError, AppResult};
use crate::models::{LeaderboardEntry, LeaderboardResponse};
use crate::services::analytics_service::round_to;

pub const LEADERBOARD_DAYS: usize = 7;

#[derive(Debug, Clone, FromRow)]
pub struct AthleteTotals {
    pub athlete_id: i64,
    pub athlete_name: String,
    pub total_punches: i64,
    pub avg_speed: f64,
}

#[derive(Debug, Clone, FromRow)]
struct DailyCount {
    athlete_id: i64,
    day: i32,
    total: i64,
}

/// Sort by punches (desc) and assign competition ranks: tied athletes share
/// a rank and the next rank skips ahead (1, 1, 3).
pub fn rank_entries(mut totals: Vec<AthleteTotals>) -> Vec<(usize, AthleteTotals)> {
    totals.sort_by(|a, b| {
        b.total_punches
            .cmp(&a.total_punches)
            .then_with(|| a.athlete_name.cmp(&b.athlete_name))
    });

    let mut ranked = Vec::with_capacity(totals.len());
    let mut rank = 0;
    let mut previous = None;

    for (position, totals) in totals.into_iter().enumerate() {
        if previous != Some(totals.total_punches) {
            rank = position + 1;
            previous = Some(totals.total_punches);
        }
        ranked.push((rank, totals));
    }

    ranked
}

#[derive(Debug, Clone)]
pub struct LeaderboardService {
    db: PgPool,
}

impl LeaderboardService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn leaderboard(&self, coach_id: i64, range: &str) -> AppResult<LeaderboardResponse> {
        if range != "week" {
            return Err(AppError::bad_request("Only weekly leaderboard is supported"));
        }

        let week_end = Utc::now();
        let week_start = week_end - Duration::days(LEADERBOARD_DAYS as i64);

        let totals = sqlx::query_as::<_, AthleteTotals>(
            "SELECT u.id AS athlete_id, u.username AS athlete_name,
                    COALESCE(SUM(p.count), 0)::BIGINT AS total_punches,
                    COALESCE(SUM(p.speed * p.count) / NULLIF(SUM(p.count), 0), 0)::DOUBLE PRECISION AS avg_speed
             FROM coach_athlete ca
             JOIN users u ON u.id = ca.athlete_id
             LEFT JOIN punches p ON p.user_id = u.id AND p.timestamp >= $2 AND p.timestamp < $3
             WHERE ca.coach_id = $1
             GROUP BY u.id, u.username",
        )
        .bind(coach_id)
        .bind(week_start)
        .bind(week_end)
        .fetch_all(&self.db)
        .await?;

        let daily = sqlx::query_as::<_, DailyCount>(
            "SELECT p.user_id AS athlete_id,
                    FLOOR(EXTRACT(EPOCH FROM (p.timestamp - $2)) / 86400)::INTEGER AS day,
                    SUM(p.count)::BIGINT AS total
             FROM punches p
             JOIN coach_athlete ca ON ca.athlete_id = p.user_id AND ca.coach_id = $1
             WHERE p.timestamp >= $2 AND p.timestamp < $3
             GROUP BY p.user_id, day",
        )
        .bind(coach_id)
        .bind(week_start)
        .bind(week_end)
        .fetch_all(&self.db)
        .await?;

        let entries = rank_entries(totals)
            .into_iter()
            .map(|(rank, totals)| LeaderboardEntry {
                daily_punches: daily_buckets(totals.athlete_id, &daily),
                athlete_id: totals.athlete_id,
                athlete_name: totals.athlete_name,
                total_punches: totals.total_punches,
                avg_speed: round_to(totals.avg_speed, 2),
                rank,
            })
            .collect();

        Ok(LeaderboardResponse {
            entries,
            week_start,
            week_end,
        })
    }
}

fn daily_buckets(athlete_id: i64, daily: &[DailyCount]) -> Vec<i64> {
    let mut buckets = vec![0; LEADERBOARD_DAYS];
    for row in daily.iter().filter(|row| row.athlete_id == athlete_id) {
        if let Some(bucket) = usize::try_from(row.day).ok().and_then(|day| buckets.get_mut(day)) {
            *bucket += row.total;
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn totals(id: i64, name: &str, punches: i64) -> AthleteTotals {
        AthleteTotals {
            athlete_id: id,
            athlete_name: name.to_string(),
            total_punches: punches,
            avg_speed: 20.0,
        }
    }

    #[test]
    fn test_competition_ranking() {
        let ranked = rank_entries(vec![
            totals(1, "carol", 50),
            totals(2, "alice", 120),
            totals(3, "bob", 120),
            totals(4, "dave", 0),
        ]);

        let summary: Vec<(usize, &str)> = ranked.iter().map(|(rank, t)| (*rank, t.athlete_name.as_str())).collect();
        assert_eq!(summary, vec![(1, "alice"), (1, "bob"), (3, "carol"), (4, "dave")]);
    }

    #[test]
    fn test_empty_leaderboard() {
        assert!(rank_entries(Vec::new()).is_empty());
    }

    #[test]
    fn test_daily_buckets() {
        let daily = vec![
            DailyCount { athlete_id: 1, day: 0, total: 10 },
            DailyCount { athlete_id: 1, day: 6, total: 4 },
            DailyCount { athlete_id: 2, day: 3, total: 99 },
            DailyCount { athlete_id: 1, day: 7, total: 1 },
        ];

        assert_eq!(daily_buckets(1, &daily), vec![10, 0, 0, 0, 0, 0, 4]);
        assert_eq!(daily_buckets(3, &daily), vec![0; 7]);
    }
}
