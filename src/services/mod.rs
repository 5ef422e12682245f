// Business logic services

pub mod analytics_service;
pub mod auth_flow_service;
pub mod cache_service;
pub mod coach_service;
pub mod device_service;
pub mod email_service;
pub mod leaderboard_service;
pub mod notification_scheduler;
pub mod notification_service;
pub mod punch_service;
pub mod segmentation;
pub mod session_service;
pub mod workout_service;

pub use analytics_service::AnalyticsService;
pub use auth_flow_service::AuthFlowService;
pub use cache_service::CacheService;
pub use coach_service::CoachService;
pub use device_service::DeviceService;
pub use email_service::{EmailConfig, EmailService};
pub use leaderboard_service::LeaderboardService;
pub use notification_scheduler::NotificationScheduler;
pub use notification_service::NotificationService;
pub use punch_service::PunchService;
pub use session_service::SessionService;
pub use workout_service::WorkoutService;
