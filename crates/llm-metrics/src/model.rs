//! Data model for the request metric record and its aggregates.

use serde::{Deserialize, Serialize};

/// Aggregation period requested by `GetAggregates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Today,
    Yesterday,
    Week,
    Month,
}

/// A single request's lifecycle, written once at start and at most once
/// at completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request_id: String,
    pub backend: String,
    pub operation: String,
    pub caller: Option<String>,
    pub start_unix_ms: i64,
    pub end_unix_ms: Option<i64>,
    pub latency_ms: Option<f64>,
    pub success: Option<bool>,
    pub tokens: Option<u32>,
    pub error: Option<String>,
}

impl RequestRecord {
    pub fn is_completed(&self) -> bool {
        self.end_unix_ms.is_some()
    }
}

/// Per (backend, operation, day) rolling counters plus the retained
/// latency list used for percentile computation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DailyCounters {
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub token_sum: u64,
    /// Most recent latencies, oldest first, trimmed to 1000 entries.
    pub latencies_ms: Vec<f64>,
}

const MAX_RETAINED_LATENCIES: usize = 1000;

impl DailyCounters {
    pub fn record(&mut self, success: bool, latency_ms: f64, tokens: Option<u32>) {
        self.request_count += 1;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        if let Some(tokens) = tokens {
            self.token_sum += tokens as u64;
        }
        self.latencies_ms.push(latency_ms);
        if self.latencies_ms.len() > MAX_RETAINED_LATENCIES {
            let overflow = self.latencies_ms.len() - MAX_RETAINED_LATENCIES;
            self.latencies_ms.drain(0..overflow);
        }
    }
}

/// Read-side view combining (possibly several days' worth of) counters
/// into the shape `GetAggregates` returns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Aggregates {
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub token_sum: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub success_rate: f64,
}

impl Aggregates {
    /// `success_rate = 100` and `avg_latency_ms = 1.0` when there is no
    /// data at all, matching the "substitute neutral defaults" policy the
    /// selector relies on rather than treating missing metrics as zero
    /// (zero latency would look infinitely fast; zero success rate would
    /// look permanently broken).
    pub fn neutral() -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            failure_count: 0,
            token_sum: 0,
            avg_latency_ms: 1.0,
            p95_latency_ms: 1.0,
            p99_latency_ms: 1.0,
            success_rate: 100.0,
        }
    }

    pub fn from_counters(counters: &DailyCounters) -> Self {
        if counters.request_count == 0 {
            return Self::neutral();
        }
        let mut sorted = counters.latencies_ms.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Self {
            request_count: counters.request_count,
            success_count: counters.success_count,
            failure_count: counters.failure_count,
            token_sum: counters.token_sum,
            avg_latency_ms: mean(&sorted),
            p95_latency_ms: percentile(&sorted, 0.95),
            p99_latency_ms: percentile(&sorted, 0.99),
            success_rate: 100.0 * counters.success_count as f64 / counters.request_count as f64,
        }
    }

    /// Merges several days' counters into one window, recomputing
    /// percentiles from the concatenated latency samples.
    pub fn merge(aggs: &[DailyCounters]) -> Self {
        let mut combined = DailyCounters::default();
        for a in aggs {
            combined.request_count += a.request_count;
            combined.success_count += a.success_count;
            combined.failure_count += a.failure_count;
            combined.token_sum += a.token_sum;
            combined.latencies_ms.extend(a.latencies_ms.iter().copied());
        }
        Self::from_counters(&combined)
    }
}

fn mean(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

/// Percentile by sorting ascending and indexing at `floor(len * p)`,
/// saturating to the last element when the index would fall out of
/// range. This is the exact method the distilled system uses, preserved
/// as documented behavior rather than switched to an interpolated
/// estimator.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    let idx = idx.min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_defaults_have_full_success_rate() {
        let a = Aggregates::neutral();
        assert_eq!(a.success_rate, 100.0);
        assert_eq!(a.avg_latency_ms, 1.0);
    }

    #[test]
    fn percentile_saturates_at_last_element() {
        let sorted: Vec<f64> = (1..=10).map(|n| n as f64).collect();
        assert_eq!(percentile(&sorted, 0.99), 10.0);
    }

    #[test]
    fn counters_record_trims_to_max_retained() {
        let mut c = DailyCounters::default();
        for i in 0..(MAX_RETAINED_LATENCIES + 10) {
            c.record(true, i as f64, None);
        }
        assert_eq!(c.latencies_ms.len(), MAX_RETAINED_LATENCIES);
        // oldest 10 were dropped, so the first retained sample is 10.0
        assert_eq!(c.latencies_ms[0], 10.0);
    }

    #[test]
    fn from_counters_computes_success_rate() {
        let mut c = DailyCounters::default();
        c.record(true, 10.0, Some(5));
        c.record(false, 20.0, None);
        let agg = Aggregates::from_counters(&c);
        assert_eq!(agg.request_count, 2);
        assert_eq!(agg.success_rate, 50.0);
        assert_eq!(agg.token_sum, 5);
    }
}
