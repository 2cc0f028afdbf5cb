//! The backing store abstraction C3 is generic over: a Redis-backed
//! implementation for production, and an in-memory implementation used
//! both as the fail-open/offline fallback and directly in unit tests.

use crate::model::{DailyCounters, RequestRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Errors surfaced by a metrics store round trip. The recorder treats any
/// of these as "store unavailable" and degrades to in-memory, per the
/// component's fail-soft policy.
#[derive(Debug, Clone)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "metrics store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Persistence contract for request records and daily counters. Schema
/// prefixes follow the persisted-state layout: `llm_metrics:request:<id>`
/// for individual records, `llm_metrics:daily:<backend>:<op>:<YYYY-MM-DD>`
/// for the per-day counter hash.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn put_request(&self, record: &RequestRecord) -> Result<(), StoreError>;
    async fn get_request(&self, request_id: &str) -> Result<Option<RequestRecord>, StoreError>;

    async fn get_daily(&self, key: &str) -> Result<DailyCounters, StoreError>;
    async fn record_daily(
        &self,
        key: &str,
        success: bool,
        latency_ms: f64,
        tokens: Option<u32>,
    ) -> Result<(), StoreError>;
}

/// In-memory store: a pair of mutex-guarded maps. Used when no Redis URL
/// is configured and as the degraded-mode target when Redis is
/// unreachable.
#[derive(Default)]
pub struct InMemoryStore {
    requests: Mutex<HashMap<String, RequestRecord>>,
    daily: Mutex<HashMap<String, DailyCounters>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsStore for InMemoryStore {
    async fn put_request(&self, record: &RequestRecord) -> Result<(), StoreError> {
        let mut guard = self.requests.lock().unwrap();
        guard.insert(record.request_id.clone(), record.clone());
        Ok(())
    }

    async fn get_request(&self, request_id: &str) -> Result<Option<RequestRecord>, StoreError> {
        let guard = self.requests.lock().unwrap();
        Ok(guard.get(request_id).cloned())
    }

    async fn get_daily(&self, key: &str) -> Result<DailyCounters, StoreError> {
        let guard = self.daily.lock().unwrap();
        Ok(guard.get(key).cloned().unwrap_or_default())
    }

    async fn record_daily(
        &self,
        key: &str,
        success: bool,
        latency_ms: f64,
        tokens: Option<u32>,
    ) -> Result<(), StoreError> {
        let mut guard = self.daily.lock().unwrap();
        guard
            .entry(key.to_string())
            .or_default()
            .record(success, latency_ms, tokens);
        Ok(())
    }
}

#[cfg(feature = "redis-store")]
pub mod redis_store {
    use super::*;
    use redis::AsyncCommands;

    /// Redis-backed store. Records are serialized JSON under
    /// `llm_metrics:request:<id>`; daily counters are a single JSON blob
    /// under `llm_metrics:daily:<key>` updated read-modify-write, which is
    /// sufficient given the component's documented best-effort semantics
    /// (the recorder is explicitly allowed to degrade rather than offer
    /// cross-process atomicity here).
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
    impl MetricsStore for RedisStore {
        async fn put_request(&self, record: &RequestRecord) -> Result<(), StoreError> {
            let mut conn = self.conn().await?;
            let key = format!("llm_metrics:request:{}", record.request_id);
            let payload = serde_json::to_string(record).map_err(|e| StoreError(e.to_string()))?;
            conn.set::<_, _, ()>(key, payload)
                .await
                .map_err(|e| StoreError(e.to_string()))
        }

        async fn get_request(&self, request_id: &str) -> Result<Option<RequestRecord>, StoreError> {
            let mut conn = self.conn().await?;
            let key = format!("llm_metrics:request:{request_id}");
            let raw: Option<String> = conn.get(key).await.map_err(|e| StoreError(e.to_string()))?;
            match raw {
                Some(raw) => serde_json::from_str(&raw)
                    .map(Some)
                    .map_err(|e| StoreError(e.to_string())),
                None => Ok(None),
            }
        }

        async fn get_daily(&self, key: &str) -> Result<DailyCounters, StoreError> {
            let mut conn = self.conn().await?;
            let redis_key = format!("llm_metrics:daily:{key}");
            let raw: Option<String> = conn
                .get(redis_key)
                .await
                .map_err(|e| StoreError(e.to_string()))?;
            match raw {
                Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError(e.to_string())),
                None => Ok(DailyCounters::default()),
            }
        }

        async fn record_daily(
            &self,
            key: &str,
            success: bool,
            latency_ms: f64,
            tokens: Option<u32>,
        ) -> Result<(), StoreError> {
            let mut counters = self.get_daily(key).await?;
            counters.record(success, latency_ms, tokens);
            let mut conn = self.conn().await?;
            let redis_key = format!("llm_metrics:daily:{key}");
            let payload =
                serde_json::to_string(&counters).map_err(|e| StoreError(e.to_string()))?;
            conn.set::<_, _, ()>(redis_key, payload)
                .await
                .map_err(|e| StoreError(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_round_trips_requests() {
        let store = InMemoryStore::new();
        let record = RequestRecord {
            request_id: "r1".into(),
            backend: "b1".into(),
            operation: "generate".into(),
            caller: None,
            start_unix_ms: 0,
            end_unix_ms: None,
            latency_ms: None,
            success: None,
            tokens: None,
            error: None,
        };
        store.put_request(&record).await.unwrap();
        let fetched = store.get_request("r1").await.unwrap().unwrap();
        assert_eq!(fetched.backend, "b1");
    }

    #[tokio::test]
    async fn in_memory_store_accumulates_daily_counters() {
        let store = InMemoryStore::new();
        store
            .record_daily("b1:generate:2026-07-28", true, 12.0, Some(10))
            .await
            .unwrap();
        store
            .record_daily("b1:generate:2026-07-28", false, 30.0, None)
            .await
            .unwrap();
        let counters = store.get_daily("b1:generate:2026-07-28").await.unwrap();
        assert_eq!(counters.request_count, 2);
        assert_eq!(counters.success_count, 1);
    }
}
