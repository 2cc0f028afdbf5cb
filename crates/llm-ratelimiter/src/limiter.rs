//! The rate limiter (C4): `CheckAndConsume`/`GetUsage`/`Reset` over a
//! pluggable [`RateLimitStore`].

use crate::store::{InMemoryStore, RateLimitStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Result of a `CheckAndConsume` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at_unix_ms: i64,
}

/// Fixed-window counter keyed by (principal, category). When the backing
/// store is unreachable, fails open: returns `allowed=true` with a
/// sentinel reset rather than cascading the outage into every caller.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Atomically increments the bucket and admits iff the post-increment
    /// count is within `limit`. `remaining = max(0, limit - count)`.
    pub async fn check_and_consume(
        &self,
        key: &str,
        category: &str,
        limit: u64,
        window: Duration,
    ) -> Admission {
        let now = Utc::now().timestamp_millis();
        match self.store.increment(key, category, window, now).await {
            Ok(window_count) => {
                let allowed = window_count.count <= limit;
                let remaining = limit.saturating_sub(window_count.count);
                Admission {
                    allowed,
                    remaining,
                    reset_at_unix_ms: window_count.reset_unix_ms,
                }
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(key, category, "rate limit store unreachable, failing open");
                Admission {
                    allowed: true,
                    remaining: limit,
                    reset_at_unix_ms: now + window.as_millis() as i64,
                }
            }
        }
    }

    pub async fn get_usage(&self, key: &str, category: &str) -> Option<Admission> {
        self.store
            .usage(key, category)
            .await
            .ok()
            .flatten()
            .map(|wc| Admission {
                allowed: true,
                remaining: 0,
                reset_at_unix_ms: wc.reset_unix_ms,
            })
    }

    pub async fn reset(&self, key: &str, category: &str) {
        let _ = self.store.reset(key, category).await;
    }
}

/// Seconds from now until `reset_at_unix_ms`, clamped to `>= 1` so callers
/// always get a usable `retry_after` even if the window edge has already
/// passed by the time they read it.
pub fn retry_after_secs(reset_at_unix_ms: i64) -> u64 {
    let now = Utc::now().timestamp_millis();
    let remaining_ms = (reset_at_unix_ms - now).max(1000);
    (remaining_ms as u64).div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_the_limit_then_denies() {
        let limiter = RateLimiter::in_memory();
        for i in 1..=3 {
            let admission = limiter
                .check_and_consume("u1", "generate", 3, Duration::from_secs(60))
                .await;
            assert!(admission.allowed, "call {i} should be allowed");
        }
        let denied = limiter
            .check_and_consume("u1", "generate", 3, Duration::from_secs(60))
            .await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
    }

    #[tokio::test]
    async fn remaining_is_non_increasing_within_a_window() {
        let limiter = RateLimiter::in_memory();
        let first = limiter
            .check_and_consume("u2", "generate", 10, Duration::from_secs(60))
            .await;
        let second = limiter
            .check_and_consume("u2", "generate", 10, Duration::from_secs(60))
            .await;
        assert!(second.remaining <= first.remaining);
    }

    #[tokio::test]
    async fn reset_clears_the_bucket_for_the_next_call() {
        let limiter = RateLimiter::in_memory();
        limiter
            .check_and_consume("u3", "generate", 1, Duration::from_secs(60))
            .await;
        limiter.reset("u3", "generate").await;
        let admission = limiter
            .check_and_consume("u3", "generate", 1, Duration::from_secs(60))
            .await;
        assert!(admission.allowed);
        assert_eq!(admission.remaining, 0);
    }

    #[tokio::test]
    async fn different_categories_have_independent_buckets() {
        let limiter = RateLimiter::in_memory();
        limiter
            .check_and_consume("u4", "generate", 1, Duration::from_secs(60))
            .await;
        let embed = limiter
            .check_and_consume("u4", "embed", 1, Duration::from_secs(60))
            .await;
        assert!(embed.allowed);
    }
}
