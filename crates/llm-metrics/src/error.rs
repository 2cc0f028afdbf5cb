use std::fmt;

/// Errors raised by the metrics recorder's public surface. Store-level
/// failures never reach callers: they trigger degrade-to-in-memory
/// instead, per the component's fail-soft policy.
#[derive(Debug, Clone)]
pub enum MetricsError {
    /// `RecordEnd` was called for a request id with no matching
    /// `RecordStart`.
    UnknownRequest(String),
}

impl fmt::Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsError::UnknownRequest(id) => write!(f, "unknown request id: {id}"),
        }
    }
}

impl std::error::Error for MetricsError {}
