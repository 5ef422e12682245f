use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use super::{env_opt, env_or, env_parse};

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = match env_opt("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgresql://{}:{}@{}:{}/{}",
                env_or("POSTGRES_USER", "postgres"),
                env_or("POSTGRES_PASSWORD", "password"),
                env_or("POSTGRES_HOST", "localhost"),
                env_parse::<u16>("POSTGRES_PORT", 5432),
                env_or("POSTGRES_DB", "punchtracker"),
            ),
        };

        let connect_timeout_secs: u64 = env_parse("DB_CONNECT_TIMEOUT", 30);
        let idle_timeout_secs: u64 = env_parse("DB_IDLE_TIMEOUT", 600);

        Ok(DatabaseConfig {
            database_url,
            max_connections: env_parse("DB_MAX_CONNECTIONS", 20),
            min_connections: env_parse("DB_MIN_CONNECTIONS", 2),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
        })
    }

    pub async fn create_pool(&self) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout)
            .idle_timeout(Some(self.idle_timeout))
            .connect(&self.database_url)
            .await
            .context("failed to connect to PostgreSQL")?;

        tracing::info!(
            max_connections = self.max_connections,
            "Database pool established"
        );

        Ok(pool)
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply database migrations")?;
    Ok(())
}
