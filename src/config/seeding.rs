use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::PgPool;

use crate::auth::{hash_password, UserRole};

pub const DEMO_EMAIL: &str = "test@example.com";
const DEMO_USERNAME: &str = "testuser";
const DEMO_COACH_EMAIL: &str = "coach@example.com";
const DEMO_COACH_USERNAME: &str = "democoach";
const DEMO_PASSWORD: &str = "password123";
const DEMO_PUNCHES: i64 = 50;
const PUNCH_TYPES: [&str; 4] = ["jab", "cross", "hook", "uppercut"];

/// Demo punch stream: one punch a minute from `start`, 15-35 mph, 1-3 reps
pub fn demo_punches(start: DateTime<Utc>, count: i64) -> Vec<(DateTime<Utc>, &'static str, f64, i32)> {
    let mut rng = rand::thread_rng();

    (0..count)
        .map(|i| {
            let punch_type = PUNCH_TYPES[rng.gen_range(0..PUNCH_TYPES.len())];
            let speed = (rng.gen_range(15.0..35.0_f64) * 10.0).round() / 10.0;
            (start + Duration::minutes(i), punch_type, speed, rng.gen_range(1..=3))
        })
        .collect()
}

pub struct DatabaseSeeder {
    pool: PgPool,
}

impl DatabaseSeeder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent: does nothing once the demo athlete exists
    pub async fn seed_all(&self) -> Result<()> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = $1")
            .bind(DEMO_EMAIL)
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_some() {
            tracing::info!("Demo data already present, skipping seeding");
            return Ok(());
        }

        tracing::info!("Starting database seeding...");

        let athlete_id = self
            .seed_user(DEMO_USERNAME, DEMO_EMAIL, UserRole::Athlete)
            .await?;
        let coach_id = self
            .seed_user(DEMO_COACH_USERNAME, DEMO_COACH_EMAIL, UserRole::Coach)
            .await?;

        sqlx::query("INSERT INTO coach_athlete (coach_id, athlete_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(coach_id)
            .bind(athlete_id)
            .execute(&self.pool)
            .await?;

        self.seed_training(athlete_id).await?;

        tracing::info!(athlete_id, coach_id, "Database seeding completed!");
        Ok(())
    }

    async fn seed_user(&self, username: &str, email: &str, role: UserRole) -> Result<i64> {
        let password_hash = hash_password(DEMO_PASSWORD).context("Failed to hash demo password")?;

        let user_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, email, password_hash, role, email_verified)
             VALUES ($1, $2, $3, $4, TRUE)
             ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
             RETURNING id",
        )
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO notification_prefs (user_id, email_enabled, webhook_enabled)
             VALUES ($1, TRUE, FALSE)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id, role = role.as_str(), "Created demo user");
        Ok(user_id)
    }

    async fn seed_training(&self, user_id: i64) -> Result<()> {
        let started_at = Utc::now() - Duration::hours(2);
        let ended_at = started_at + Duration::minutes(DEMO_PUNCHES);

        let mut tx = self.pool.begin().await?;

        let session_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO sessions (user_id, name, started_at, ended_at) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(user_id)
        .bind("Morning Training Session")
        .bind(started_at)
        .bind(ended_at)
        .fetch_one(&mut *tx)
        .await?;

        let workout_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO workouts (user_id, name, started_at, ended_at, auto_detected)
             VALUES ($1, $2, $3, $4, FALSE)
             RETURNING id",
        )
        .bind(user_id)
        .bind("Morning Training Session")
        .bind(started_at)
        .bind(ended_at)
        .fetch_one(&mut *tx)
        .await?;

        for (timestamp, punch_type, speed, count) in demo_punches(started_at, DEMO_PUNCHES) {
            sqlx::query(
                "INSERT INTO punches (user_id, session_id, workout_id, punch_type, speed, count, timestamp)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(user_id)
            .bind(session_id)
            .bind(workout_id)
            .bind(punch_type)
            .bind(speed)
            .bind(count)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(session_id, workout_id, punches = DEMO_PUNCHES, "Seeded demo workout");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_punches_shape() {
        let start = Utc::now();
        let punches = demo_punches(start, 50);

        assert_eq!(punches.len(), 50);
        assert_eq!(punches[0].0, start);
        assert_eq!(punches[49].0, start + Duration::minutes(49));

        for (_, punch_type, speed, count) in &punches {
            assert!(PUNCH_TYPES.contains(punch_type));
            assert!((15.0..=35.0).contains(speed));
            assert!((1..=3).contains(count));
        }
    }
}
