use anyhow::Result;

use super::{env_flag, env_opt, env_or, env_parse};
use crate::services::email_service::EmailConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub cors_origin: String,
    pub frontend_url: String,
    pub redis_url: Option<String>,
    pub seed_demo_data: bool,
    pub auth: AuthConfig,
    pub workouts: WorkoutConfig,
    pub device: DeviceConfig,
    pub scheduler: SchedulerConfig,
    pub email: EmailConfig,
}

/// Token lifetimes and cookie settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expire_minutes: i64,
    pub email_verify_ttl_minutes: i64,
    pub password_reset_ttl_minutes: i64,
    pub cookie_secure: bool,
}

/// Thresholds for workout segmentation and idle detection
#[derive(Debug, Clone)]
pub struct WorkoutConfig {
    pub inactivity_minutes: i64,
    pub segment_rest_min_secs: i64,
    pub segment_active_min_secs: i64,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub rate_limit_per_min: u32,
    pub webhook_drift_secs: i64,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first)
    pub weekly_report_cron: String,
    pub idle_workout_cron: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let environment = env_or("ENVIRONMENT", &defaults.environment);
        let secure_by_default = environment == "production";

        Ok(AppConfig {
            host: env_or("HOST", &defaults.host),
            port: env_parse("PORT", defaults.port),
            environment,
            log_level: env_or("LOG_LEVEL", &defaults.log_level),
            cors_origin: env_or("CORS_ORIGIN", &defaults.cors_origin),
            frontend_url: env_or("FRONTEND_URL", &defaults.frontend_url),
            redis_url: redis_url_from_env(),
            seed_demo_data: env_flag("SEED_DEMO_DATA", false),
            auth: AuthConfig {
                jwt_secret: env_or("JWT_SECRET", &defaults.auth.jwt_secret),
                jwt_expire_minutes: env_parse("JWT_EXPIRE_MINUTES", defaults.auth.jwt_expire_minutes),
                email_verify_ttl_minutes: env_parse(
                    "EMAIL_VERIFY_TOKEN_TTL_MIN",
                    defaults.auth.email_verify_ttl_minutes,
                ),
                password_reset_ttl_minutes: env_parse(
                    "PASSWORD_RESET_TOKEN_TTL_MIN",
                    defaults.auth.password_reset_ttl_minutes,
                ),
                cookie_secure: env_flag("COOKIE_SECURE", secure_by_default),
            },
            workouts: WorkoutConfig {
                inactivity_minutes: env_parse("INACTIVITY_MINUTES", defaults.workouts.inactivity_minutes),
                segment_rest_min_secs: env_parse(
                    "SEGMENT_REST_MIN_S",
                    defaults.workouts.segment_rest_min_secs,
                ),
                segment_active_min_secs: env_parse(
                    "SEGMENT_ACTIVE_MIN_S",
                    defaults.workouts.segment_active_min_secs,
                ),
            },
            device: DeviceConfig {
                rate_limit_per_min: env_parse("RATE_LIMIT_PER_MIN", defaults.device.rate_limit_per_min),
                webhook_drift_secs: env_parse("WEBHOOK_DRIFT_SEC", defaults.device.webhook_drift_secs),
            },
            scheduler: SchedulerConfig {
                enabled: env_flag("NOTIFICATIONS_ENABLED", defaults.scheduler.enabled),
                weekly_report_cron: env_or("NOTIFICATION_CRON", &defaults.scheduler.weekly_report_cron),
                idle_workout_cron: env_or("IDLE_WORKOUT_CRON", &defaults.scheduler.idle_workout_cron),
            },
            email: EmailConfig::from_env(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            redis_url: None,
            seed_demo_data: false,
            auth: AuthConfig {
                jwt_secret: "your-secret-key-change-in-production".to_string(),
                jwt_expire_minutes: 1440,
                email_verify_ttl_minutes: 60,
                password_reset_ttl_minutes: 60,
                cookie_secure: false,
            },
            workouts: WorkoutConfig {
                inactivity_minutes: 3,
                segment_rest_min_secs: 15,
                segment_active_min_secs: 40,
            },
            device: DeviceConfig {
                rate_limit_per_min: 60,
                webhook_drift_secs: 120,
            },
            scheduler: SchedulerConfig {
                enabled: true,
                weekly_report_cron: "0 0 9 * * Mon".to_string(),
                idle_workout_cron: "0 * * * * *".to_string(),
            },
            email: EmailConfig::default(),
        }
    }
}

/// `REDIS_URL` wins; otherwise the URL is assembled from `REDIS_HOST`,
/// `REDIS_PORT` and `REDIS_PASSWORD`. `REDIS_ENABLED=false` turns caching off.
fn redis_url_from_env() -> Option<String> {
    if !env_flag("REDIS_ENABLED", true) {
        return None;
    }

    if let Some(url) = env_opt("REDIS_URL") {
        return Some(url);
    }

    let host = env_or("REDIS_HOST", "localhost");
    let port: u16 = env_parse("REDIS_PORT", 6379);
    Some(match env_opt("REDIS_PASSWORD") {
        Some(password) => format!("redis://:{}@{}:{}/", password, host, port),
        None => format!("redis://{}:{}/", host, port),
    })
}
