use anyhow::Result;
use redis::aio::MultiplexedConnection;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

const OP_TIMEOUT: Duration = Duration::from_millis(500);

pub const SESSION_STATS_TTL_SECS: u64 = 3600;
pub const WEEKLY_TTL_SECS: u64 = 300;
pub const WORKOUT_SUMMARY_TTL_SECS: u64 = 300;

/// Cache key layout shared by every service
pub mod keys {
    pub fn session_stats(session_id: i64) -> String {
        format!("session_stats:{}", session_id)
    }

    pub fn weekly(user_id: i64) -> String {
        format!("weekly:{}", user_id)
    }

    pub fn workout_summary(workout_id: i64) -> String {
        format!("workout:summary:{}", workout_id)
    }

    pub fn rate_limit(api_key_id: i64) -> String {
        format!("rate_limit:{}", api_key_id)
    }
}

/// Best-effort Redis cache. Every failure is logged and reported as a miss,
/// so callers never see a cache error.
#[derive(Clone)]
pub struct CacheService {
    client: Option<redis::Client>,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("enabled", &self.client.is_some())
            .finish()
    }
}

impl CacheService {
    pub fn new(redis_url: Option<&str>) -> Result<Self> {
        let client = match redis_url {
            Some(url) => Some(redis::Client::open(url)?),
            None => None,
        };

        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(None)),
        })
    }

    pub fn disabled() -> Self {
        Self {
            client: None,
            connection: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    async fn connection(&self) -> Option<MultiplexedConnection> {
        let client = self.client.as_ref()?;
        let mut guard = self.connection.lock().await;

        if let Some(conn) = guard.as_ref() {
            return Some(conn.clone());
        }

        match timeout(OP_TIMEOUT, client.get_multiplexed_tokio_connection()).await {
            Ok(Ok(conn)) => {
                *guard = Some(conn.clone());
                Some(conn)
            }
            Ok(Err(e)) => {
                warn!("Redis unavailable: {}", e);
                None
            }
            Err(_) => {
                warn!("Timed out connecting to Redis");
                None
            }
        }
    }

    async fn reset(&self) {
        self.connection.lock().await.take();
    }

    async fn run<T: redis::FromRedisValue>(&self, cmd: redis::Cmd, op: &str) -> Option<T> {
        let mut conn = self.connection().await?;
        let outcome = timeout(OP_TIMEOUT, cmd.query_async::<_, T>(&mut conn)).await;
        self.settle(outcome, op).await
    }

    async fn run_pipeline<T: redis::FromRedisValue>(&self, pipe: redis::Pipeline, op: &str) -> Option<T> {
        let mut conn = self.connection().await?;
        let outcome = timeout(OP_TIMEOUT, pipe.query_async::<_, T>(&mut conn)).await;
        self.settle(outcome, op).await
    }

    async fn settle<T>(
        &self,
        outcome: Result<redis::RedisResult<T>, tokio::time::error::Elapsed>,
        op: &str,
    ) -> Option<T> {
        match outcome {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("Redis {} failed: {}", op, e);
                self.reset().await;
                None
            }
            Err(_) => {
                warn!("Redis {} timed out", op);
                self.reset().await;
                None
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);

        let raw: Option<String> = self.run::<Option<String>>(cmd, "GET").await.flatten();
        let raw = raw?;

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        if !self.is_enabled() {
            return;
        }

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };

        let mut cmd = redis::cmd("SETEX");
        cmd.arg(key).arg(ttl_secs).arg(payload);
        let _ = self.run::<()>(cmd, "SETEX").await;
    }

    pub async fn delete(&self, keys: &[String]) {
        if keys.is_empty() || !self.is_enabled() {
            return;
        }

        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        let _ = self.run::<i64>(cmd, "DEL").await;
    }

    /// Fixed-window counter. Returns `None` when the cache cannot answer.
    pub async fn incr_window(&self, key: &str, window_secs: u64) -> Option<i64> {
        let (count,) = self
            .run_pipeline::<(i64,)>(window_pipeline(key, window_secs), "INCR window")
            .await?;
        Some(count)
    }
}

/// One MULTI/EXEC: create the key with its TTL if absent, then INCR.
/// The counter can never exist without an expiry.
fn window_pipeline(key: &str, window_secs: u64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("EX")
        .arg(window_secs)
        .arg("NX")
        .ignore()
        .cmd("INCR")
        .arg(key);
    pipe
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(keys::session_stats(7), "session_stats:7");
        assert_eq!(keys::weekly(3), "weekly:3");
        assert_eq!(keys::workout_summary(11), "workout:summary:11");
        assert_eq!(keys::rate_limit(5), "rate_limit:5");
    }

    #[tokio::test]
    async fn test_disabled_cache_is_a_miss() {
        let cache = CacheService::disabled();
        assert!(!cache.is_enabled());

        cache.set_json("weekly:1", &42, 60).await;
        assert_eq!(cache.get_json::<i32>("weekly:1").await, None);
        assert_eq!(cache.incr_window("rate_limit:1", 60).await, None);
        cache.delete(&["weekly:1".to_string()]).await;
    }

    #[test]
    fn test_window_pipeline_sets_ttl_before_incr_atomically() {
        let packed = String::from_utf8(window_pipeline("rate_limit:5", 60).get_packed_pipeline()).unwrap();
        let position = |needle: &str| packed.find(needle).unwrap_or_else(|| panic!("{} missing", needle));

        assert!(position("MULTI") < position("SET"));
        assert!(position("SET") < position("INCR"));
        assert!(position("INCR") < position("EXEC"));
        assert!(packed.contains("\r\nEX\r\n"));
        assert!(packed.contains("\r\nNX\r\n"));
        assert!(packed.contains("\r\n60\r\n"));
        assert!(!packed.contains("EXPIRE"));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(CacheService::new(Some("not a redis url")).is_err());
        assert!(CacheService::new(None).unwrap().client.is_none());
    }
}
