//! Sharded cache variant: fans out by key or tenant hash across N
//! backing nodes. `FlushTenant` is the one operation that must touch
//! every shard.

use crate::store::{CacheStore, InMemoryStore};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// How the shard index is derived from a cache operation's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardingStrategy {
    /// Hash the whole key, so related keys for the same tenant can land
    /// on different shards.
    ByKey,
    /// Hash only the tenant id (the first `tenant:<id>:` segment),
    /// keeping one tenant's keys co-located on a single shard. Required
    /// for `flush_tenant` to stay a single-shard operation per tenant,
    /// though the current implementation conservatively sweeps every
    /// shard regardless of strategy.
    ByTenant,
}

pub struct ShardedCache {
    shards: Vec<Arc<dyn CacheStore>>,
    strategy: ShardingStrategy,
}

impl ShardedCache {
    pub fn new(shards: Vec<Arc<dyn CacheStore>>, strategy: ShardingStrategy) -> Self {
        assert!(!shards.is_empty(), "sharded cache requires at least one shard");
        Self { shards, strategy }
    }

    /// An all-in-memory sharded cache with `n` shards, for tests and for
    /// running without a configured set of backing node URLs.
    pub fn in_memory(n: usize, strategy: ShardingStrategy) -> Self {
        let shards = (0..n.max(1))
            .map(|_| Arc::new(InMemoryStore::new()) as Arc<dyn CacheStore>)
            .collect();
        Self::new(shards, strategy)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn selector(&self, key: &str) -> &str {
        match self.strategy {
            ShardingStrategy::ByKey => key,
            ShardingStrategy::ByTenant => tenant_of(key).unwrap_or(key),
        }
    }

    fn shard_for(&self, key: &str) -> &Arc<dyn CacheStore> {
        let selector = self.selector(key);
        let mut hasher = DefaultHasher::new();
        selector.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.shard_for(key).get(key).await {
            Ok(value) => value,
            Err(_) => None,
        }
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        if self.shard_for(key).set(key, value, ttl).await.is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!(key, "sharded cache set failed, ignoring");
        }
    }

    pub async fn delete(&self, key: &str) {
        let _ = self.shard_for(key).delete(key).await;
    }

    /// Iterates all shards, enumerates keys matching `tenant:<id>:*`, and
    /// deletes them. Keys written through this cache must be namespaced
    /// with the tenant id for this to find them.
    pub async fn flush_tenant(&self, tenant_id: &str) {
        let prefix = format!("tenant:{tenant_id}:");
        for shard in &self.shards {
            if let Ok(keys) = shard.keys_with_prefix(&prefix).await {
                for key in keys {
                    let _ = shard.delete(&key).await;
                }
            }
        }
    }

    pub async fn flush(&self) {
        for shard in &self.shards {
            let _ = shard.flush().await;
        }
    }
}

fn tenant_of(key: &str) -> Option<&str> {
    let rest = key.strip_prefix("tenant:")?;
    let (tenant, _) = rest.split_once(':')?;
    Some(tenant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_are_retrievable_through_the_same_key() {
        let cache = ShardedCache::in_memory(3, ShardingStrategy::ByTenant);
        cache
            .set("tenant:t1:foo", b"v".to_vec(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("tenant:t1:foo").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn flush_tenant_removes_only_that_tenants_keys_across_all_shards() {
        let cache = ShardedCache::in_memory(3, ShardingStrategy::ByTenant);
        for i in 0..100 {
            cache
                .set(&format!("tenant:t1:{i}"), b"x".to_vec(), Duration::from_secs(60))
                .await;
            cache
                .set(&format!("tenant:t2:{i}"), b"y".to_vec(), Duration::from_secs(60))
                .await;
        }

        cache.flush_tenant("t1").await;

        for i in 0..100 {
            assert_eq!(cache.get(&format!("tenant:t1:{i}")).await, None);
            assert_eq!(cache.get(&format!("tenant:t2:{i}")).await, Some(b"y".to_vec()));
        }
    }

    #[tokio::test]
    async fn by_tenant_strategy_colocates_a_tenants_keys() {
        let cache = ShardedCache::in_memory(4, ShardingStrategy::ByTenant);
        let first = cache.selector("tenant:t1:a").to_string();
        let second = cache.selector("tenant:t1:b").to_string();
        assert_eq!(first, second);
    }
}
