pub mod metrics;
pub mod rate_limiting;

pub use metrics::track_metrics;
pub use rate_limiting::{RateLimitConfig, RateLimiter};
