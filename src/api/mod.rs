// API routes and handlers

pub mod analytics;
pub mod auth;
pub mod coach;
pub mod device;
pub mod extract;
pub mod health;
pub mod notifications;
pub mod punches;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod workouts;

pub use routes::create_routes;
pub use state::AppState;
