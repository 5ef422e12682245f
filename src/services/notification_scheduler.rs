use anyhow::{anyhow, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;
use crate::services::device_service::DeviceService;
use crate::services::notification_service::NotificationService;
use crate::services::workout_service::WorkoutService;

/// Cron jobs for weekly reports and idle workout cleanup. Each run is
/// independent: a failed run is logged and the next tick starts fresh.
pub struct NotificationScheduler {
    scheduler: JobScheduler,
    notifications: NotificationService,
    workouts: WorkoutService,
    devices: DeviceService,
    config: SchedulerConfig,
}

impl std::fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationScheduler")
            .field("config", &self.config)
            .finish()
    }
}

impl NotificationScheduler {
    pub async fn new(
        notifications: NotificationService,
        workouts: WorkoutService,
        devices: DeviceService,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {}", e))?;

        Ok(Self {
            scheduler,
            notifications,
            workouts,
            devices,
            config,
        })
    }

    /// Register both jobs and start ticking
    pub async fn start(&self) -> Result<()> {
        self.add_weekly_report_job().await?;
        self.add_idle_workout_job().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {}", e))?;

        info!(
            weekly_report_cron = %self.config.weekly_report_cron,
            idle_workout_cron = %self.config.idle_workout_cron,
            "Notification scheduler started"
        );
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop job scheduler: {}", e))?;

        info!("Notification scheduler stopped");
        Ok(())
    }

    async fn add_weekly_report_job(&self) -> Result<()> {
        let notifications = self.notifications.clone();

        let job = Job::new_async(self.config.weekly_report_cron.as_str(), move |_uuid, _l| {
            let notifications = notifications.clone();

            Box::pin(async move {
                info!("Running weekly report job");
                match notifications.send_weekly_reports().await {
                    Ok(results) => info!(
                        emails_sent = results.emails_sent,
                        webhooks_sent = results.webhooks_sent,
                        errors = results.errors,
                        "Weekly report job finished"
                    ),
                    Err(e) => error!("Weekly report job failed: {}", e),
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create weekly report job: {}", e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add weekly report job: {}", e))?;
        Ok(())
    }

    async fn add_idle_workout_job(&self) -> Result<()> {
        let workouts = self.workouts.clone();
        let devices = self.devices.clone();

        let job = Job::new_async(self.config.idle_workout_cron.as_str(), move |_uuid, _l| {
            let workouts = workouts.clone();
            let devices = devices.clone();

            Box::pin(async move {
                match workouts.close_idle_workouts(None).await {
                    Ok(0) => {}
                    Ok(closed) => info!(closed, "Closed idle auto-detected workouts"),
                    Err(e) => error!("Idle workout job failed: {}", e),
                }

                let pruned = devices.prune_rate_limits();
                if pruned > 0 {
                    debug!(pruned, "Pruned idle device rate limit windows");
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create idle workout job: {}", e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add idle workout job: {}", e))?;
        Ok(())
    }
}
