use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_size: Duration,
}

impl RateLimitConfig {
    pub fn per_minute(requests: u32) -> Self {
        Self {
            requests_per_window: requests,
            window_size: Duration::from_secs(60),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

#[derive(Debug, Default)]
struct RateLimitEntry {
    requests: Vec<Instant>,
}

impl RateLimitEntry {
    fn prune(&mut self, now: Instant, window_size: Duration) {
        self.requests
            .retain(|&request_time| now.duration_since(request_time) < window_size);
    }
}

/// In-process sliding window limiter. Used for device ingestion when the
/// shared Redis counter is unavailable.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a request for `key`; `false` once the window is full
    pub fn check_rate_limit(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let Ok(mut store) = self.store.write() else {
            tracing::warn!("Rate limiter store poisoned, allowing request");
            return true;
        };

        let entry = store.entry(key.to_string()).or_default();
        entry.prune(now, self.config.window_size);

        if entry.requests.len() >= self.config.requests_per_window as usize {
            return false;
        }

        entry.requests.push(now);
        true
    }

    /// Drop keys with no requests inside the current window; returns how many went
    pub fn cleanup_old_entries(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    fn cleanup_at(&self, now: Instant) -> usize {
        let Ok(mut store) = self.store.write() else {
            return 0;
        };

        let before = store.len();
        store.retain(|_, entry| {
            entry.prune(now, self.config.window_size);
            !entry.requests.is_empty()
        });
        before - store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_after_limit() {
        let limiter = RateLimiter::new(RateLimitConfig::per_minute(3));

        assert!(limiter.check_rate_limit("key:1"));
        assert!(limiter.check_rate_limit("key:1"));
        assert!(limiter.check_rate_limit("key:1"));
        assert!(!limiter.check_rate_limit("key:1"));

        // Other keys have their own window
        assert!(limiter.check_rate_limit("key:2"));
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 1,
            window_size: Duration::from_secs(60),
        });
        let start = Instant::now();

        assert!(limiter.check_at("key", start));
        assert!(!limiter.check_at("key", start + Duration::from_secs(30)));
        assert!(limiter.check_at("key", start + Duration::from_secs(61)));
    }

    #[test]
    fn test_cleanup_removes_idle_keys() {
        let limiter = RateLimiter::new(RateLimitConfig::per_minute(5));
        let start = Instant::now();

        limiter.check_at("idle", start);
        limiter.check_at("busy", start + Duration::from_secs(50));

        assert_eq!(limiter.cleanup_at(start + Duration::from_secs(55)), 0);
        assert_eq!(limiter.cleanup_at(start + Duration::from_secs(70)), 1);
        assert_eq!(limiter.cleanup_at(start + Duration::from_secs(120)), 1);
        assert_eq!(limiter.cleanup_old_entries(), 0);
    }

    #[test]
    fn test_cleaned_key_starts_a_fresh_window() {
        let limiter = RateLimiter::new(RateLimitConfig::per_minute(1));
        let start = Instant::now();

        assert!(limiter.check_at("key", start));
        assert!(!limiter.check_at("key", start + Duration::from_secs(1)));
        assert_eq!(limiter.cleanup_at(start + Duration::from_secs(61)), 1);
        assert!(limiter.check_at("key", start + Duration::from_secs(62)));
    }
}
