//! Error types for backend adapters.

use std::fmt;

/// Failure modes a [`crate::Backend`] can surface.
///
/// Mirrors the error kinds enumerated for the backend adapter component:
/// transport failure, non-2xx provider response, malformed response body,
/// caller cancellation and deadline expiry are kept as distinct variants
/// rather than collapsed into one "request failed" bucket, since the
/// selector and dispatcher make different decisions (retry vs. surface)
/// depending on which one fired.
#[derive(Debug)]
pub enum BackendError {
    /// Transport/connection failure reaching the provider.
    Unavailable(String),
    /// The provider responded with a non-2xx status.
    ProviderError { status: u16, body: String },
    /// The response body could not be decoded into the expected shape.
    DecodeError(String),
    /// The caller's cancellation token fired.
    Cancelled,
    /// The caller-provided deadline elapsed before the provider responded.
    DeadlineExceeded,
}

impl BackendError {
    /// `ProviderError` on a 5xx is worth retrying once; 4xx is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Unavailable(_) => true,
            BackendError::ProviderError { status, .. } => *status >= 500,
            BackendError::DecodeError(_) | BackendError::Cancelled | BackendError::DeadlineExceeded => {
                false
            }
        }
    }

    /// Whether C8 may fall back to the next-best backend for this error.
    /// Decode errors and cancellation are not transport-level and are
    /// surfaced as-is rather than retried against a different backend.
    /// A 4xx `ProviderError` is the caller's fault, not the backend's, so
    /// it is surfaced immediately rather than burning a fallback attempt
    /// on a different backend that would fail the same way.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
            || matches!(self, BackendError::ProviderError { status, .. } if *status >= 500)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unavailable(msg) => write!(f, "backend unavailable: {msg}"),
            BackendError::ProviderError { status, body } => {
                write!(f, "provider returned {status}: {body}")
            }
            BackendError::DecodeError(msg) => write!(f, "decode error: {msg}"),
            BackendError::Cancelled => write!(f, "cancelled"),
            BackendError::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::DeadlineExceeded
        } else if err.is_decode() {
            BackendError::DecodeError(err.to_string())
        } else {
            BackendError::Unavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_retryable_only_on_5xx() {
        let server_err = BackendError::ProviderError {
            status: 503,
            body: String::new(),
        };
        let client_err = BackendError::ProviderError {
            status: 400,
            body: String::new(),
        };
        assert!(server_err.is_retryable());
        assert!(!client_err.is_retryable());
    }

    #[test]
    fn decode_error_is_not_retryable_or_fallback_eligible() {
        let err = BackendError::DecodeError("bad json".into());
        assert!(!err.is_retryable());
        assert!(!err.is_fallback_eligible());
    }

    #[test]
    fn provider_error_fallback_eligible_only_on_5xx() {
        let server_err = BackendError::ProviderError {
            status: 503,
            body: String::new(),
        };
        let client_err = BackendError::ProviderError {
            status: 400,
            body: String::new(),
        };
        assert!(server_err.is_fallback_eligible());
        assert!(!client_err.is_fallback_eligible());
    }
}
