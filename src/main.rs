use anyhow::Result;
use punch_tracker::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder};
use punch_tracker::services::{CacheService, NotificationScheduler};
use punch_tracker::{create_routes, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    if config.is_production() && !config.auth.cookie_secure {
        warn!("COOKIE_SECURE is disabled in production");
    }

    let db_config = DatabaseConfig::from_env()?;
    let pool = db_config.create_pool().await?;
    run_migrations(&pool).await?;
    info!("Database migrations applied");

    if config.seed_demo_data {
        DatabaseSeeder::new(pool.clone()).seed_all().await?;
    }

    let cache = CacheService::new(config.redis_url.as_deref())?;
    let state = AppState::new(config.clone(), pool, cache);

    let mut scheduler = if config.scheduler.enabled {
        let scheduler = NotificationScheduler::new(
            state.notifications.clone(),
            state.workouts.clone(),
            state.devices.clone(),
            config.scheduler.clone(),
        )
        .await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        info!("Notification scheduler disabled");
        None
    };

    let app = create_routes(state);

    let listener = TcpListener::bind(config.server_address()).await?;
    info!("PunchTracker server starting on http://{}", config.server_address());
    info!("Health check available at http://{}/health", config.server_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            warn!("Failed to stop notification scheduler: {}", e);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
