//! PunchTracker: a training log API for boxing workouts, punches, coaching
//! relationships and device ingestion.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use api::{create_routes, AppState};
pub use error::{AppError, AppResult};
