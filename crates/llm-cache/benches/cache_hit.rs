use criterion::{black_box, criterion_group, criterion_main, Criterion};
use llm_cache::{build_cache, ShardingStrategy};
use std::time::Duration;

fn bench_single_node_get_hit(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let cache = build_cache(vec![], ShardingStrategy::ByKey);
    runtime.block_on(cache.set("bench-key", b"cached response body".to_vec(), Duration::from_secs(60)));

    c.bench_function("cache_single_node_get_hit", |b| {
        b.to_async(&runtime).iter(|| async {
            let value = cache.get("bench-key").await;
            black_box(value);
        });
    });
}

fn bench_single_node_set(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let cache = build_cache(vec![], ShardingStrategy::ByKey);

    c.bench_function("cache_single_node_set", |b| {
        b.to_async(&runtime).iter(|| async {
            cache
                .set("bench-key", black_box(b"cached response body".to_vec()), Duration::from_secs(60))
                .await;
        });
    });
}

fn bench_sharded_get_hit(c: &mut Criterion) {
    use llm_cache::{CacheStore, InMemoryStore};
    use std::sync::Arc;

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let stores: Vec<Arc<dyn CacheStore>> = (0..4).map(|_| Arc::new(InMemoryStore::new()) as Arc<dyn CacheStore>).collect();
    let cache = build_cache(stores, ShardingStrategy::ByTenant);
    runtime.block_on(cache.set("tenant:t1:bench-key", b"cached response body".to_vec(), Duration::from_secs(60)));

    c.bench_function("cache_sharded_get_hit", |b| {
        b.to_async(&runtime).iter(|| async {
            let value = cache.get("tenant:t1:bench-key").await;
            black_box(value);
        });
    });
}

criterion_group!(benches, bench_single_node_get_hit, bench_single_node_set, bench_sharded_get_hit);
criterion_main!(benches);
