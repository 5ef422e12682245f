use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::{AuthService, JwtService};
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::services::{
    AnalyticsService, AuthFlowService, CacheService, CoachService, DeviceService, EmailService,
    LeaderboardService, NotificationService, PunchService, SessionService, WorkoutService,
};

/// Shared application state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: PgPool,
    pub cache: CacheService,
    pub jwt: JwtService,
    pub metrics: Arc<Metrics>,
    pub auth: AuthService,
    pub auth_flows: AuthFlowService,
    pub sessions: SessionService,
    pub punches: PunchService,
    pub analytics: AnalyticsService,
    pub workouts: WorkoutService,
    pub coach: CoachService,
    pub leaderboard: LeaderboardService,
    pub devices: DeviceService,
    pub notifications: NotificationService,
}

impl AppState {
    pub fn new(config: AppConfig, db: PgPool, cache: CacheService) -> Self {
        let jwt = JwtService::new(&config.auth.jwt_secret, config.auth.jwt_expire_minutes);
        let metrics = Arc::new(Metrics::new());
        let email = Arc::new(EmailService::new(config.email.clone()));

        let auth = AuthService::new(db.clone(), jwt.clone());
        let auth_flows = AuthFlowService::new(
            db.clone(),
            auth.clone(),
            email.clone(),
            config.auth.clone(),
            config.frontend_url.clone(),
        );
        let sessions = SessionService::new(db.clone());
        let analytics = AnalyticsService::new(db.clone(), cache.clone());
        let workouts = WorkoutService::new(db.clone(), cache.clone(), metrics.clone(), config.workouts.clone());
        let punches = PunchService::new(
            db.clone(),
            cache.clone(),
            metrics.clone(),
            sessions.clone(),
            workouts.clone(),
            analytics.clone(),
        );
        let coach = CoachService::new(db.clone());
        let leaderboard = LeaderboardService::new(db.clone());
        let devices = DeviceService::new(
            db.clone(),
            cache.clone(),
            metrics.clone(),
            workouts.clone(),
            config.device.clone(),
        );
        let notifications = NotificationService::new(db.clone(), email, analytics.clone(), metrics.clone());

        Self {
            config: Arc::new(config),
            db,
            cache,
            jwt,
            metrics,
            auth,
            auth_flows,
            sessions,
            punches,
            analytics,
            workouts,
            coach,
            leaderboard,
            devices,
            notifications,
        }
    }
}
