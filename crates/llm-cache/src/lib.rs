//! The response cache (C5): single-node and sharded TTL key-value
//! variants. A cache is a hint, never a source of truth — a miss is not
//! an error, and a failed write is logged and ignored.

mod cache;
mod factory;
mod sharded;
mod store;

pub use cache::Cache;
pub use factory::{build_cache, AnyCache};
pub use sharded::{ShardedCache, ShardingStrategy};
pub use store::{CacheStore, InMemoryStore, StoreError};

#[cfg(feature = "redis-store")]
pub use store::redis_store::RedisStore;
