//! Quantified invariant: `Cache::set(k, v)` followed by `Cache::get(k)`
//! returns `v` for any serializable byte string, prior to TTL expiry.

use llm_cache::{build_cache, ShardingStrategy};
use proptest::prelude::*;
use std::time::Duration;

fn run_round_trip(key: String, value: Vec<u8>) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async move {
        let cache = build_cache(vec![], ShardingStrategy::ByKey);
        cache.set(&key, value.clone(), Duration::from_secs(60)).await;
        assert_eq!(cache.get(&key).await, Some(value));
    });
}

fn run_sharded_round_trip(tenant: String, suffix: String, value: Vec<u8>) {
    use llm_cache::{CacheStore, InMemoryStore};
    use std::sync::Arc;

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async move {
        let stores: Vec<Arc<dyn CacheStore>> =
            (0..5).map(|_| Arc::new(InMemoryStore::new()) as Arc<dyn CacheStore>).collect();
        let cache = build_cache(stores, ShardingStrategy::ByTenant);
        let key = format!("tenant:{tenant}:{suffix}");
        cache.set(&key, value.clone(), Duration::from_secs(60)).await;
        assert_eq!(cache.get(&key).await, Some(value));
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn set_then_get_round_trips_on_single_node(
        key in "[a-zA-Z0-9:_-]{1,32}",
        value in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        run_round_trip(key, value);
    }

    #[test]
    fn set_then_get_round_trips_across_shards(
        tenant in "[a-zA-Z0-9]{1,8}",
        suffix in "[a-zA-Z0-9_-]{1,16}",
        value in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        run_sharded_round_trip(tenant, suffix, value);
    }
}
