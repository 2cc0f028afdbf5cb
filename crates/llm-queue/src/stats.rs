//! Queue-internal per-backend counters and the rolling completion window
//! the stats emitter reports from. Deliberately separate from C3
//! (`llm-metrics`): these describe scheduling behavior (how long work sat
//! queued, how often the queue itself expired a task) and exist even if
//! the caller never touches `llm-metrics` at all.

use crate::model::TaskStatus;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Matches the spec's "keep the last 1000" rolling window for completions
/// surfaced by the periodic stats emitter.
const RECENT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, Default)]
pub struct BackendStats {
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    total_latency_ms: f64,
}

impl BackendStats {
    pub fn avg_latency_ms(&self) -> f64 {
        let terminal = self.completed + self.failed + self.timed_out;
        if terminal == 0 {
            0.0
        } else {
            self.total_latency_ms / terminal as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub backend_id: String,
    pub status: TaskStatus,
    pub queue_wait: Duration,
    pub execution_time: Duration,
}

#[derive(Default)]
pub struct StatsTable {
    per_backend: Mutex<HashMap<String, BackendStats>>,
    recent: Mutex<VecDeque<CompletionRecord>>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enqueue(&self, backend_id: &str) {
        let mut guard = self.per_backend.lock().unwrap();
        guard.entry(backend_id.to_string()).or_default().queued += 1;
    }

    pub fn on_start(&self, backend_id: &str) {
        let mut guard = self.per_backend.lock().unwrap();
        let entry = guard.entry(backend_id.to_string()).or_default();
        entry.queued = entry.queued.saturating_sub(1);
        entry.running += 1;
    }

    /// A task expired in the heap before a worker slot was ever acquired;
    /// it never reaches `on_start`.
    pub fn on_admission_timeout(&self, backend_id: &str, queue_wait: Duration) {
        let mut guard = self.per_backend.lock().unwrap();
        let entry = guard.entry(backend_id.to_string()).or_default();
        entry.queued = entry.queued.saturating_sub(1);
        entry.timed_out += 1;
        drop(guard);
        self.push_recent(CompletionRecord {
            backend_id: backend_id.to_string(),
            status: TaskStatus::Timeout,
            queue_wait,
            execution_time: Duration::ZERO,
        });
    }

    pub fn on_complete(
        &self,
        backend_id: &str,
        status: TaskStatus,
        queue_wait: Duration,
        execution_time: Duration,
    ) {
        let mut guard = self.per_backend.lock().unwrap();
        let entry = guard.entry(backend_id.to_string()).or_default();
        entry.running = entry.running.saturating_sub(1);
        entry.total_latency_ms += execution_time.as_secs_f64() * 1000.0;
        match status {
            TaskStatus::Completed => entry.completed += 1,
            TaskStatus::Failed => entry.failed += 1,
            TaskStatus::Timeout => entry.timed_out += 1,
        }
        drop(guard);
        self.push_recent(CompletionRecord {
            backend_id: backend_id.to_string(),
            status,
            queue_wait,
            execution_time,
        });
    }

    fn push_recent(&self, record: CompletionRecord) {
        let mut recent = self.recent.lock().unwrap();
        if recent.len() >= RECENT_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(record);
    }

    pub fn snapshot(&self) -> HashMap<String, BackendStats> {
        self.per_backend.lock().unwrap().clone()
    }

    pub fn for_backend(&self, backend_id: &str) -> BackendStats {
        self.per_backend
            .lock()
            .unwrap()
            .get(backend_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn recent_completions(&self) -> Vec<CompletionRecord> {
        self.recent.lock().unwrap().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_queued_running_and_terminal_counts() {
        let table = StatsTable::new();
        table.on_enqueue("b1");
        table.on_enqueue("b1");
        table.on_start("b1");
        table.on_complete(
            "b1",
            TaskStatus::Completed,
            Duration::from_millis(5),
            Duration::from_millis(20),
        );

        let stats = table.for_backend("b1");
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.running, 0);
        assert_eq!(stats.completed, 1);
        assert!(stats.avg_latency_ms() > 0.0);
    }

    #[test]
    fn recent_completions_window_is_capped() {
        let table = StatsTable::new();
        for _ in 0..(RECENT_CAPACITY + 10) {
            table.on_complete(
                "b1",
                TaskStatus::Completed,
                Duration::ZERO,
                Duration::from_millis(1),
            );
        }
        assert_eq!(table.recent_completions().len(), RECENT_CAPACITY);
    }
}
