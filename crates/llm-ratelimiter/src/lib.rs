//! The rate limiter (C4): a fixed-window counter per (principal,
//! category) with persistent counters, failing open when the backing
//! store is unreachable.

mod limiter;
mod store;

pub use limiter::{retry_after_secs, Admission, RateLimiter};
pub use store::{InMemoryStore, RateLimitStore, StoreError, WindowCount};

#[cfg(feature = "redis-store")]
pub use store::redis_store::RedisStore;
