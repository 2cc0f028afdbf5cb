//! The metrics recorder (C3): counts requests/successes/failures,
//! records latencies, and exposes per-(backend, operation, day)
//! aggregates that the selector and the `/metrics` HTTP surface both
//! read from.

mod error;
mod model;
mod recorder;
mod store;

pub use error::MetricsError;
pub use model::{Aggregates, DailyCounters, Period, RequestRecord};
pub use recorder::MetricsRecorder;
pub use store::{InMemoryStore, MetricsStore, StoreError};

#[cfg(feature = "redis-store")]
pub use store::redis_store::RedisStore;
