//! The metrics recorder (C3): `RecordStart`/`RecordEnd` writes plus
//! `GetAggregates`/`GetRequest` reads, backed by a pluggable
//! [`MetricsStore`].

use crate::error::MetricsError;
use crate::model::{Aggregates, DailyCounters, Period, RequestRecord};
use crate::store::{InMemoryStore, MetricsStore};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Request-level metrics recorder. Holds the configured store plus an
/// in-memory fallback, and degrades to the fallback (logging a warning
/// once) the first time the primary store errors.
pub struct MetricsRecorder {
    primary: Arc<dyn MetricsStore>,
    fallback: Arc<InMemoryStore>,
    degraded: AtomicBool,
    warned: AtomicBool,
}

impl MetricsRecorder {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self {
            primary: store,
            fallback: Arc::new(InMemoryStore::new()),
            degraded: AtomicBool::new(false),
            warned: AtomicBool::new(false),
        }
    }

    /// Recorder with no external store at all; equivalent to always being
    /// in degraded mode. Useful for tests and for binaries that run
    /// without a configured metrics backing URL.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    fn active_store(&self) -> Arc<dyn MetricsStore> {
        if self.degraded.load(Ordering::Relaxed) {
            Arc::clone(&self.fallback) as Arc<dyn MetricsStore>
        } else {
            Arc::clone(&self.primary)
        }
    }

    fn degrade_once(&self) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            #[cfg(feature = "tracing")]
            tracing::warn!("metrics store unreachable, degrading to in-memory recorder");
        }
        let _ = self.warned.swap(true, Ordering::SeqCst);
    }

    /// Writes the start of a request and returns its generated id.
    pub async fn record_start(
        &self,
        backend: impl Into<String>,
        operation: impl Into<String>,
        caller: Option<String>,
    ) -> String {
        let request_id = Uuid::new_v4().to_string();
        let record = RequestRecord {
            request_id: request_id.clone(),
            backend: backend.into(),
            operation: operation.into(),
            caller,
            start_unix_ms: Utc::now().timestamp_millis(),
            end_unix_ms: None,
            latency_ms: None,
            success: None,
            tokens: None,
            error: None,
        };

        let store = self.active_store();
        if store.put_request(&record).await.is_err() {
            self.degrade_once();
            let _ = self.fallback.put_request(&record).await;
        }
        request_id
    }

    /// Writes the completion of a request. Idempotent on `request_id`:
    /// if the stored record already has an end timestamp, this is a
    /// no-op.
    pub async fn record_end(
        &self,
        request_id: &str,
        success: bool,
        latency_ms: f64,
        tokens: Option<u32>,
        error: Option<String>,
    ) -> Result<(), MetricsError> {
        let store = self.active_store();
        let mut record = match store.get_request(request_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(MetricsError::UnknownRequest(request_id.to_string())),
            Err(_) => {
                self.degrade_once();
                match self.fallback.get_request(request_id).await {
                    Ok(Some(record)) => record,
                    _ => return Err(MetricsError::UnknownRequest(request_id.to_string())),
                }
            }
        };

        if record.is_completed() {
            return Ok(());
        }

        record.end_unix_ms = Some(Utc::now().timestamp_millis());
        record.latency_ms = Some(latency_ms);
        record.success = Some(success);
        record.tokens = tokens;
        record.error = error;

        let store = self.active_store();
        if store.put_request(&record).await.is_err() {
            self.degrade_once();
            let _ = self.fallback.put_request(&record).await;
        }

        let day = today_key();
        let daily_key = format!("{}:{}:{}", record.backend, record.operation, day);
        let store = self.active_store();
        if store
            .record_daily(&daily_key, success, latency_ms, tokens)
            .await
            .is_err()
        {
            self.degrade_once();
            let _ = self
                .fallback
                .record_daily(&daily_key, success, latency_ms, tokens)
                .await;
        }

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("llm_requests_total", "backend" => record.backend.clone(), "operation" => record.operation.clone()).increment(1);
            if !success {
                metrics::counter!("llm_request_failures_total", "backend" => record.backend.clone()).increment(1);
            }
        }

        Ok(())
    }

    pub async fn get_request(&self, request_id: &str) -> Option<RequestRecord> {
        self.active_store().get_request(request_id).await.ok().flatten()
    }

    /// Aggregates per (backend, operation) over `period`, substituting
    /// [`Aggregates::neutral`] when there is no data rather than
    /// surfacing an error - the selector depends on always getting a
    /// usable aggregate back.
    pub async fn get_aggregates(
        &self,
        backend: &str,
        operation: &str,
        period: Period,
    ) -> Aggregates {
        let store = self.active_store();
        let mut per_day = Vec::new();
        for day in days_in_period(period) {
            let key = format!("{backend}:{operation}:{day}");
            if let Ok(counters) = store.get_daily(&key).await {
                per_day.push(counters);
            }
        }
        if per_day.iter().all(|c| c.request_count == 0) {
            Aggregates::neutral()
        } else {
            Aggregates::merge(&per_day)
        }
    }
}

fn today_key() -> String {
    Utc::now().date_naive().to_string()
}

/// Expands a period into the concrete set of `YYYY-MM-DD` day keys whose
/// counters must be summed, matching the `llm_metrics:daily:<...>:<day>`
/// schema's one-bucket-per-day layout.
fn days_in_period(period: Period) -> Vec<String> {
    let today = Utc::now().date_naive();
    match period {
        Period::Today => vec![today.to_string()],
        Period::Yesterday => vec![(today - ChronoDuration::days(1)).to_string()],
        Period::Week => expand_back(today, 7),
        Period::Month => expand_back(today, 30),
    }
}

fn expand_back(today: NaiveDate, days: i64) -> Vec<String> {
    (0..days).map(|n| (today - ChronoDuration::days(n)).to_string()).collect()
}
