//! The priority queue / worker pool itself: a bounded-concurrency
//! scheduler that admits tasks in priority order (lowest numeric value
//! first, FIFO within a priority). Each task carries a single deadline,
//! `exec_timeout`, measured from its creation: if the task is still
//! sitting in the heap once that deadline has elapsed, it expires
//! without ever running; otherwise the deadline's remaining budget
//! becomes the adapter call's execution timeout.

use crate::error::QueueError;
use crate::model::{HeapKey, Task, TaskId, TaskKind, TaskOutput, TaskResult, TaskStatus, Work};
use crate::stats::{BackendStats, CompletionRecord, StatsTable};
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How long the dispatch loop sleeps between heap polls when it finds
/// nothing to do and nobody has notified it of new work. A safety net
/// against a missed wakeup, not the primary signaling path.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A task whose deadline has already elapsed by the time a worker slot
/// frees up still gets this much runway rather than zero, so a backend
/// call is never started with an already-expired deadline.
const EXEC_FLOOR: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub(crate) max_concurrent: usize,
    pub(crate) default_exec_timeout: Duration,
    pub(crate) stats_log_interval: Duration,
}

/// Builder for [`QueueConfig`].
pub struct QueueConfigBuilder {
    max_concurrent: usize,
    default_exec_timeout: Duration,
    stats_log_interval: Duration,
}

impl Default for QueueConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueConfigBuilder {
    /// Defaults: max_concurrent 5, default_exec_timeout 500s, stats_log_interval 30s.
    pub fn new() -> Self {
        Self {
            max_concurrent: 5,
            default_exec_timeout: Duration::from_secs(500),
            stats_log_interval: Duration::from_secs(30),
        }
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn default_exec_timeout(mut self, d: Duration) -> Self {
        self.default_exec_timeout = d;
        self
    }

    pub fn stats_log_interval(mut self, d: Duration) -> Self {
        self.stats_log_interval = d;
        self
    }

    pub fn build(self) -> QueueConfig {
        QueueConfig {
            max_concurrent: self.max_concurrent,
            default_exec_timeout: self.default_exec_timeout,
            stats_log_interval: self.stats_log_interval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueStatus {
    pub queued: usize,
    pub in_flight: usize,
    pub slot_utilization: f64,
    pub per_backend: HashMap<String, BackendStats>,
    pub recent_completions: Vec<CompletionRecord>,
}

struct Inner {
    config: QueueConfig,
    heap: Mutex<BinaryHeap<HeapKey>>,
    tasks: Mutex<HashMap<TaskId, Task>>,
    notify: Notify,
    semaphore: Arc<Semaphore>,
    stats: StatsTable,
    sequence: AtomicU64,
    running: AtomicBool,
    shutdown: CancellationToken,
}

/// Priority queue / worker pool (C7). Cheap to clone; all state lives
/// behind the shared `Inner`.
#[derive(Clone)]
pub struct PriorityQueue {
    inner: Arc<Inner>,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PriorityQueue {
    pub fn new(config: QueueConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        let inner = Arc::new(Inner {
            config,
            heap: Mutex::new(BinaryHeap::new()),
            tasks: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            semaphore,
            stats: StatsTable::new(),
            sequence: AtomicU64::new(0),
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });
        Self {
            inner,
            handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Spawns the dispatch loop and the periodic stats emitter. Idempotent.
    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap();
        if !handles.is_empty() {
            return;
        }
        self.inner.running.store(true, Ordering::SeqCst);
        handles.push(tokio::spawn(dispatch_loop(Arc::clone(&self.inner))));
        handles.push(tokio::spawn(stats_emitter(Arc::clone(&self.inner))));
    }

    /// Signals both background tasks to stop and awaits their exit.
    /// Tasks already running are allowed to finish; tasks still queued
    /// are dropped, and their callers observe a closed oneshot channel
    /// as [`QueueError::NotRunning`].
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.shutdown.cancel();
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
    }

    pub fn status(&self) -> QueueStatus {
        let in_flight = self.inner.config.max_concurrent - self.inner.semaphore.available_permits();
        QueueStatus {
            queued: self.inner.heap.lock().unwrap().len(),
            in_flight,
            slot_utilization: in_flight as f64 / self.inner.config.max_concurrent as f64,
            per_backend: self.inner.stats.snapshot(),
            recent_completions: self.inner.stats.recent_completions(),
        }
    }

    /// Submits `work` for `backend_id` at `priority` (lower runs first)
    /// and awaits its terminal [`TaskResult`]. `exec_timeout` of `None`
    /// falls back to the queue's configured default; the clock on it
    /// starts now, at enqueue time.
    pub async fn enqueue(
        &self,
        kind: TaskKind,
        backend_id: impl Into<String>,
        priority: u8,
        exec_timeout: Option<Duration>,
        work: Work,
    ) -> Result<TaskResult, QueueError> {
        if !self.inner.running.load(Ordering::SeqCst) {
            return Err(QueueError::NotRunning);
        }

        let id = Uuid::new_v4();
        let sequence = self.inner.sequence.fetch_add(1, Ordering::SeqCst);
        let backend_id = backend_id.into();
        let (sink, receiver) = oneshot::channel();

        let task = Task {
            id,
            created_at: Instant::now(),
            priority,
            exec_timeout: exec_timeout.unwrap_or(self.inner.config.default_exec_timeout),
            backend_id: backend_id.clone(),
            kind,
            work: Some(work),
            sink,
            sequence,
        };

        self.inner.stats.on_enqueue(&backend_id);
        self.inner.tasks.lock().unwrap().insert(id, task);
        self.inner
            .heap
            .lock()
            .unwrap()
            .push(HeapKey { priority, sequence, id });
        self.inner.notify.notify_one();

        receiver.await.map_err(|_| QueueError::NotRunning)
    }

    pub fn backend_stats(&self, backend_id: &str) -> BackendStats {
        self.inner.stats.for_backend(backend_id)
    }
}

async fn dispatch_loop(inner: Arc<Inner>) {
    loop {
        if inner.shutdown.is_cancelled() {
            return;
        }

        let next = inner.heap.lock().unwrap().pop();
        match next {
            Some(key) => dispatch_one(&inner, key).await,
            None => {
                tokio::select! {
                    _ = inner.notify.notified() => {}
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    _ = inner.shutdown.cancelled() => return,
                }
            }
        }
    }
}

async fn dispatch_one(inner: &Arc<Inner>, key: HeapKey) {
    let task = inner.tasks.lock().unwrap().remove(&key.id);
    let mut task = match task {
        Some(task) => task,
        None => return,
    };

    let backend_id = task.backend_id.clone();
    let queue_wait = task.created_at.elapsed();

    if queue_wait > task.exec_timeout {
        inner.stats.on_admission_timeout(&backend_id, queue_wait);
        let _ = task.sink.send(TaskResult {
            status: TaskStatus::Timeout,
            output: None,
            error: Some("task expired in queue before a worker slot was available".to_string()),
            queue_wait,
            execution_time: Duration::ZERO,
        });
        return;
    }

    // Blocks without losing the popped task: a free slot is awaited for
    // as long as it takes, the admission deadline having already been
    // checked above.
    let permit = match Arc::clone(&inner.semaphore).acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return,
    };

    inner.stats.on_start(&backend_id);
    let created_at = task.created_at;
    let exec_timeout = task.exec_timeout;
    let work = task.work.take().expect("a task's work is taken exactly once");
    let sink = task.sink;
    let inner = Arc::clone(inner);

    tokio::spawn(async move {
        let _permit = permit;
        let remaining = exec_timeout
            .checked_sub(created_at.elapsed())
            .unwrap_or(Duration::ZERO)
            .max(EXEC_FLOOR);

        let started = Instant::now();
        let outcome = tokio::time::timeout(remaining, work).await;
        let execution_time = started.elapsed();
        let queue_wait = created_at.elapsed() - execution_time;

        let (status, output, error) = match outcome {
            Ok(Ok(output)) => (TaskStatus::Completed, Some(output), None),
            Ok(Err(message)) => (TaskStatus::Failed, None, Some(message)),
            Err(_) => (
                TaskStatus::Timeout,
                None,
                Some("execution timed out".to_string()),
            ),
        };

        inner
            .stats
            .on_complete(&backend_id, status, queue_wait, execution_time);
        let _ = sink.send(TaskResult {
            status,
            output,
            error,
            queue_wait,
            execution_time,
        });
    });
}

/// Periodically logs a queue-wide snapshot at `debug`, mirroring the
/// distilled system's own periodic logger. `Status()` exposes the same
/// data on demand; this loop just narrates it on a timer.
async fn stats_emitter(inner: Arc<Inner>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(inner.config.stats_log_interval) => {}
            _ = inner.shutdown.cancelled() => return,
        }

        let queued = inner.heap.lock().unwrap().len();
        let in_flight = inner.config.max_concurrent - inner.semaphore.available_permits();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            queued,
            in_flight,
            max_concurrent = inner.config.max_concurrent,
            "queue stats snapshot"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = (queued, in_flight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn queue(max_concurrent: usize) -> PriorityQueue {
        PriorityQueue::new(
            QueueConfigBuilder::new()
                .max_concurrent(max_concurrent)
                .default_exec_timeout(Duration::from_millis(500))
                .stats_log_interval(Duration::from_secs(60))
                .build(),
        )
    }

    #[tokio::test]
    async fn completed_task_yields_its_output() {
        let q = queue(4);
        q.start();

        let result = q
            .enqueue(
                TaskKind::Generate,
                "b1",
                5,
                None,
                Box::pin(async { Ok(TaskOutput::Text("hi".into())) }),
            )
            .await
            .unwrap();

        assert_eq!(result.status, TaskStatus::Completed);
        assert!(matches!(result.output, Some(TaskOutput::Text(t)) if t == "hi"));
        q.stop().await;
    }

    #[tokio::test]
    async fn failed_work_is_reported_as_failed() {
        let q = queue(4);
        q.start();

        let result = q
            .enqueue(
                TaskKind::Generate,
                "b1",
                5,
                None,
                Box::pin(async { Err("boom".to_string()) }),
            )
            .await
            .unwrap();

        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("boom"));
        q.stop().await;
    }

    #[tokio::test]
    async fn slow_work_hits_the_execution_timeout() {
        let q = PriorityQueue::new(
            QueueConfigBuilder::new()
                .max_concurrent(1)
                .default_exec_timeout(Duration::from_millis(150))
                .stats_log_interval(Duration::from_secs(60))
                .build(),
        );
        q.start();

        let result = q
            .enqueue(
                TaskKind::Generate,
                "b1",
                5,
                None,
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(TaskOutput::Text("late".into()))
                }),
            )
            .await
            .unwrap();

        assert_eq!(result.status, TaskStatus::Timeout);
        q.stop().await;
    }

    #[tokio::test]
    async fn a_task_already_expired_at_dispatch_never_runs_its_work() {
        let q = PriorityQueue::new(
            QueueConfigBuilder::new()
                .max_concurrent(1)
                .default_exec_timeout(Duration::from_millis(10))
                .stats_log_interval(Duration::from_secs(60))
                .build(),
        );

        // Occupy the only slot so the second task sits in the heap long
        // enough to blow past its own 10ms deadline before being popped.
        q.start();
        let ran = Arc::new(AtomicBool::new(false));
        let blocker = q.enqueue(
            TaskKind::Generate,
            "b1",
            10,
            Some(Duration::from_millis(300)),
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(TaskOutput::Text("blocker".into()))
            }),
        );
        let blocker_handle = tokio::spawn(blocker);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let ran_flag = Arc::clone(&ran);
        let result = q
            .enqueue(
                TaskKind::Generate,
                "b1",
                5,
                None,
                Box::pin(async move {
                    ran_flag.store(true, Ordering::SeqCst);
                    Ok(TaskOutput::Text("should not run".into()))
                }),
            )
            .await
            .unwrap();

        assert_eq!(result.status, TaskStatus::Timeout);
        assert_eq!(result.execution_time, Duration::ZERO);
        assert!(!ran.load(Ordering::SeqCst));

        blocker_handle.await.unwrap().unwrap();
        q.stop().await;
    }

    #[tokio::test]
    async fn higher_priority_task_is_served_first() {
        let q = PriorityQueue::new(
            QueueConfigBuilder::new()
                .max_concurrent(1)
                .default_exec_timeout(Duration::from_secs(5))
                .stats_log_interval(Duration::from_secs(60))
                .build(),
        );

        let order = Arc::new(Mutex::new(Vec::new()));
        let first_started = Arc::new(tokio::sync::Notify::new());

        // Occupy the single slot first so both priorities queue up behind it.
        let blocker_order = Arc::clone(&order);
        let blocker_notify = Arc::clone(&first_started);
        q.start();
        let blocker = q.enqueue(
            TaskKind::Generate,
            "b1",
            10,
            None,
            Box::pin(async move {
                blocker_notify.notify_one();
                tokio::time::sleep(Duration::from_millis(50)).await;
                blocker_order.lock().unwrap().push(0u8);
                Ok(TaskOutput::Text("blocker".into()))
            }),
        );
        let blocker_handle = tokio::spawn(blocker);
        first_started.notified().await;

        let low_order = Arc::clone(&order);
        let low = q.enqueue(
            TaskKind::Generate,
            "b1",
            200,
            None,
            Box::pin(async move {
                low_order.lock().unwrap().push(200u8);
                Ok(TaskOutput::Text("low".into()))
            }),
        );
        let high_order = Arc::clone(&order);
        let high = q.enqueue(
            TaskKind::Generate,
            "b1",
            1,
            None,
            Box::pin(async move {
                high_order.lock().unwrap().push(1u8);
                Ok(TaskOutput::Text("high".into()))
            }),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        let (_, low_result, high_result) = tokio::join!(blocker_handle, low, high);
        low_result.unwrap();
        high_result.unwrap();

        let recorded = order.lock().unwrap().clone();
        let high_pos = recorded.iter().position(|&p| p == 1).unwrap();
        let low_pos = recorded.iter().position(|&p| p == 200).unwrap();
        assert!(high_pos < low_pos);

        q.stop().await;
    }

    #[tokio::test]
    async fn status_reports_queue_depth() {
        let q = queue(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        q.start();
        q.enqueue(
            TaskKind::Embed,
            "b1",
            5,
            None,
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(TaskOutput::Embeddings(vec![vec![0.0]]))
            }),
        )
        .await
        .unwrap();

        let status = q.status();
        assert_eq!(status.queued, 0);
        assert_eq!(status.recent_completions.len(), 1);
        q.stop().await;
    }

    #[tokio::test]
    async fn enqueue_after_stop_fails_fast() {
        let q = queue(2);
        q.start();
        q.stop().await;

        let err = q
            .enqueue(
                TaskKind::Generate,
                "b1",
                5,
                None,
                Box::pin(async { Ok(TaskOutput::Text("x".into())) }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::NotRunning));
    }
}
