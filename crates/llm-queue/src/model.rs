//! Task data model: the immutable record C7 schedules, plus its result.

use futures::future::BoxFuture;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Generate,
    Embed,
}

/// The work closure's output. C7 is opaque to the text/embedding
/// distinction beyond this tag; the dispatcher (C8) unwraps the variant
/// it expects.
#[derive(Debug, Clone)]
pub enum TaskOutput {
    Text(String),
    Embeddings(Vec<Vec<f32>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    Failed,
    Timeout,
}

/// What the result sink receives: terminal status plus timing, decoupled
/// from whether the caller is still listening (a dropped receiver is not
/// an error for the worker).
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub status: TaskStatus,
    pub output: Option<TaskOutput>,
    pub error: Option<String>,
    pub queue_wait: Duration,
    pub execution_time: Duration,
}

/// The work closure itself, boxed so tasks of different concrete futures
/// can share one heap.
pub type Work = BoxFuture<'static, Result<TaskOutput, String>>;

/// An enqueued unit of work. `work` is `Some` until the worker takes it;
/// a task is dequeued (and its work taken) at most once.
pub(crate) struct Task {
    pub id: TaskId,
    pub created_at: Instant,
    pub priority: u8,
    pub exec_timeout: Duration,
    pub backend_id: String,
    pub kind: TaskKind,
    pub work: Option<Work>,
    pub sink: tokio::sync::oneshot::Sender<TaskResult>,
    /// Monotonic sequence number, used to break priority ties in FIFO
    /// order without needing timestamp-equality comparisons.
    pub(crate) sequence: u64,
}

/// Ordering key pushed onto the heap: lower `priority` sorts first; ties
/// broken by lower `sequence` (earlier enqueue). Kept separate from
/// `Task` itself so the heap doesn't need `Task: Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeapKey {
    pub priority: u8,
    pub sequence: u64,
    pub id: TaskId,
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; reverse both fields so the smallest
        // priority (most urgent) and smallest sequence (oldest) compare
        // as the largest, and therefore pop first.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
