//! Backing store abstraction for one cache shard.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cache store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// One shard's storage contract. Values are opaque blobs; the cache
/// layer above never interprets them.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    async fn flush(&self) -> Result<(), StoreError>;

    /// All keys currently matching `prefix`, used by `FlushTenant` to
    /// enumerate `tenant:<id>:*` across a shard before deleting them.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut guard = self.entries.lock().unwrap();
        match guard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                guard.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().unwrap();
        guard.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().unwrap();
        guard.remove(key);
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().unwrap();
        guard.clear();
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let guard = self.entries.lock().unwrap();
        Ok(guard
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(feature = "redis-store")]
pub mod redis_store {
    use super::*;
    use redis::AsyncCommands;

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
    }

    #[async_trait]
    impl CacheStore for RedisStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            let mut conn = self.conn().await?;
            conn.get(key).await.map_err(|e| StoreError(e.to_string()))
        }

        async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
            let mut conn = self.conn().await?;
            conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(|e| StoreError(e.to_string()))
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            let mut conn = self.conn().await?;
            conn.del::<_, ()>(key).await.map_err(|e| StoreError(e.to_string()))
        }

        async fn flush(&self) -> Result<(), StoreError> {
            let mut conn = self.conn().await?;
            redis::cmd("FLUSHDB")
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| StoreError(e.to_string()))
        }

        async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            let mut conn = self.conn().await?;
            let pattern = format!("{prefix}*");
            let mut cursor = 0u64;
            let mut keys = Vec::new();
            loop {
                let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(200)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| StoreError(e.to_string()))?;
                keys.extend(batch);
                if next_cursor == 0 {
                    break;
                }
                cursor = next_cursor;
            }
            Ok(keys)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryStore::new();
        store.set("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn expired_entries_are_treated_as_absent() {
        let store = InMemoryStore::new();
        store.set("k", b"v".to_vec(), Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_with_prefix_filters_correctly() {
        let store = InMemoryStore::new();
        store.set("tenant:t1:a", b"1".to_vec(), Duration::from_secs(60)).await.unwrap();
        store.set("tenant:t1:b", b"2".to_vec(), Duration::from_secs(60)).await.unwrap();
        store.set("tenant:t2:a", b"3".to_vec(), Duration::from_secs(60)).await.unwrap();

        let keys = store.keys_with_prefix("tenant:t1:").await.unwrap();
        assert_eq!(keys.len(), 2);
    }
}
