//! Priority queue / worker pool (C7): a bounded-concurrency scheduler
//! sitting between the dispatcher and the backend adapters. Callers
//! submit a boxed async closure with a priority and per-task execution
//! timeout; the queue runs it once a worker slot is free, subject to a
//! separate timeout on how long it may wait for that slot.

mod error;
mod model;
mod queue;
mod stats;

pub use error::QueueError;
pub use model::{TaskId, TaskKind, TaskOutput, TaskResult, TaskStatus, Work};
pub use queue::{PriorityQueue, QueueConfig, QueueConfigBuilder, QueueStatus};
pub use stats::{BackendStats, CompletionRecord};
