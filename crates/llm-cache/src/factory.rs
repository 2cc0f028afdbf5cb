//! Picks the single-node vs. sharded cache variant based on how many
//! backing node URLs are configured — a single-node cache is the
//! degenerate case of the sharded cache with N=1, not a distinct
//! implementation.

use crate::cache::Cache;
use crate::sharded::{ShardedCache, ShardingStrategy};
use crate::store::CacheStore;
use std::sync::Arc;

/// Either cache shape, behind one handle so the dispatcher doesn't need
/// to know which variant it was constructed with.
pub enum AnyCache {
    Single(Cache),
    Sharded(ShardedCache),
}

impl AnyCache {
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self {
            AnyCache::Single(c) => c.get(key).await,
            AnyCache::Sharded(c) => c.get(key).await,
        }
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: std::time::Duration) {
        match self {
            AnyCache::Single(c) => c.set(key, value, ttl).await,
            AnyCache::Sharded(c) => c.set(key, value, ttl).await,
        }
    }

    pub async fn delete(&self, key: &str) {
        match self {
            AnyCache::Single(c) => c.delete(key).await,
            AnyCache::Sharded(c) => c.delete(key).await,
        }
    }

    pub async fn flush(&self) {
        match self {
            AnyCache::Single(c) => c.flush().await,
            AnyCache::Sharded(c) => c.flush().await,
        }
    }

    /// Only meaningful for the sharded variant; a single-node cache has
    /// no tenant-scoped sweep, so this degrades to a plain `flush` there.
    pub async fn flush_tenant(&self, tenant_id: &str) {
        match self {
            AnyCache::Single(c) => c.flush().await,
            AnyCache::Sharded(c) => c.flush_tenant(tenant_id).await,
        }
    }
}

/// Builds either variant from a list of backing-store constructors, one
/// per configured node URL. Zero or one URL yields a single-node cache;
/// more yields a sharded cache over all of them.
pub fn build_cache(stores: Vec<Arc<dyn CacheStore>>, strategy: ShardingStrategy) -> AnyCache {
    match stores.len() {
        0 => AnyCache::Single(Cache::in_memory()),
        1 => AnyCache::Single(Cache::new(stores.into_iter().next().unwrap())),
        _ => AnyCache::Sharded(ShardedCache::new(stores, strategy)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[test]
    fn zero_or_one_store_yields_single_node() {
        assert!(matches!(
            build_cache(vec![], ShardingStrategy::ByKey),
            AnyCache::Single(_)
        ));
        assert!(matches!(
            build_cache(vec![Arc::new(InMemoryStore::new())], ShardingStrategy::ByKey),
            AnyCache::Single(_)
        ));
    }

    #[test]
    fn multiple_stores_yield_sharded() {
        let stores: Vec<Arc<dyn CacheStore>> = vec![
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStore::new()),
        ];
        assert!(matches!(build_cache(stores, ShardingStrategy::ByKey), AnyCache::Sharded(_)));
    }
}
