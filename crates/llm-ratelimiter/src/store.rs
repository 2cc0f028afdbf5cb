//! Backing store abstraction for rate-limit buckets: an in-memory
//! implementation (also the unit-test target) and a Redis-backed one
//! using a Lua script for atomic increment-and-fetch.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rate limiter store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Outcome of one atomic increment against a (key, category) bucket:
/// the count after incrementing, and the window's reset unix-ms
/// timestamp (freshly computed if the window had lapsed or never
/// existed).
#[derive(Debug, Clone, Copy)]
pub struct WindowCount {
    pub count: u64,
    pub reset_unix_ms: i64,
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically increments the counter at `(key, category)`. If the
    /// stored window-reset timestamp is missing or in the past, resets
    /// the counter to 1 and sets a fresh window of `window`.
    async fn increment(
        &self,
        key: &str,
        category: &str,
        window: Duration,
        now_unix_ms: i64,
    ) -> Result<WindowCount, StoreError>;

    async fn usage(&self, key: &str, category: &str) -> Result<Option<WindowCount>, StoreError>;

    async fn reset(&self, key: &str, category: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryStore {
    buckets: Mutex<HashMap<String, WindowCount>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_key(key: &str, category: &str) -> String {
        format!("rate_limit:{category}:{key}")
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn increment(
        &self,
        key: &str,
        category: &str,
        window: Duration,
        now_unix_ms: i64,
    ) -> Result<WindowCount, StoreError> {
        let bucket_key = Self::bucket_key(key, category);
        let mut guard = self.buckets.lock().unwrap();
        let entry = guard.entry(bucket_key).or_insert(WindowCount {
            count: 0,
            reset_unix_ms: 0,
        });

        if entry.reset_unix_ms <= now_unix_ms {
            entry.count = 1;
            entry.reset_unix_ms = now_unix_ms + window.as_millis() as i64;
        } else {
            entry.count += 1;
        }
        Ok(*entry)
    }

    async fn usage(&self, key: &str, category: &str) -> Result<Option<WindowCount>, StoreError> {
        let bucket_key = Self::bucket_key(key, category);
        let guard = self.buckets.lock().unwrap();
        Ok(guard.get(&bucket_key).copied())
    }

    async fn reset(&self, key: &str, category: &str) -> Result<(), StoreError> {
        let bucket_key = Self::bucket_key(key, category);
        let mut guard = self.buckets.lock().unwrap();
        guard.remove(&bucket_key);
        Ok(())
    }
}

#[cfg(feature = "redis-store")]
pub mod redis_store {
    use super::*;
    use redis::AsyncCommands;

    /// Lua script performing the atomic increment-then-maybe-reset in one
    /// round trip: `KEYS[1]` is the bucket hash key, `ARGV[1]` the window
    /// length in ms, `ARGV[2]` the current unix-ms time.
    const INCREMENT_SCRIPT: &str = r#"
        local count = tonumber(redis.call('HGET', KEYS[1], 'count') or '0')
        local reset = tonumber(redis.call('HGET', KEYS[1], 'reset') or '0')
        local now = tonumber(ARGV[2])
        if reset <= now then
            count = 1
            reset = now + tonumber(ARGV[1])
        else
            count = count + 1
        end
        redis.call('HSET', KEYS[1], 'count', count, 'reset', reset)
        redis.call('PEXPIREAT', KEYS[1], reset + 1000)
        return {count, reset}
    "#;

    pub struct RedisStore {
        client: redis::Client,
    }

    impl RedisStore {
        pub fn open(url: &str) -> Result<Self, StoreError> {
            let client = redis::Client::open(url).map_err(|e| StoreError(e.to_string()))?;
            Ok(Self { client })
        }

        async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
            self.client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| StoreError(e.to_string()))
        }

        fn bucket_key(key: &str, category: &str) -> String {
            format!("rate_limit:{category}:{key}")
        }
    }

    #[async_trait]
    impl RateLimitStore for RedisStore {
        async fn increment(
            &self,
            key: &str,
            category: &str,
            window: Duration,
            now_unix_ms: i64,
        ) -> Result<WindowCount, StoreError> {
            let mut conn = self.conn().await?;
            let bucket_key = Self::bucket_key(key, category);
            let (count, reset): (u64, i64) = redis::Script::new(INCREMENT_SCRIPT)
                .key(bucket_key)
                .arg(window.as_millis() as i64)
                .arg(now_unix_ms)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| StoreError(e.to_string()))?;
            Ok(WindowCount {
                count,
                reset_unix_ms: reset,
            })
        }

        async fn usage(&self, key: &str, category: &str) -> Result<Option<WindowCount>, StoreError> {
            let mut conn = self.conn().await?;
            let bucket_key = Self::bucket_key(key, category);
            let result: Option<(u64, i64)> = conn
                .hget(&bucket_key, "count")
                .await
                .ok()
                .zip(conn.hget(&bucket_key, "reset").await.ok());
            Ok(result.map(|(count, reset)| WindowCount {
                count,
                reset_unix_ms: reset,
            }))
        }

        async fn reset(&self, key: &str, category: &str) -> Result<(), StoreError> {
            let mut conn = self.conn().await?;
            let bucket_key = Self::bucket_key(key, category);
            conn.del::<_, ()>(bucket_key)
                .await
                .map_err(|e| StoreError(e.to_string()))
        }
    }
}
