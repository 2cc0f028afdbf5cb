//! Quantified invariant: within a single fixed window, `remaining` is
//! non-increasing across consecutive `check_and_consume` calls for the
//! same (principal, category).

use llm_ratelimiter::RateLimiter;
use proptest::prelude::*;
use std::time::Duration;

fn run_remaining_is_monotonically_non_increasing(calls: usize, limit: u64) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async move {
        let limiter = RateLimiter::in_memory();
        let window = Duration::from_secs(3600);

        let mut previous_remaining = limit;
        for _ in 0..calls {
            let admission = limiter.check_and_consume("tenant-1", "generate", limit, window).await;
            assert!(
                admission.remaining <= previous_remaining,
                "remaining increased within the same window: {} -> {}",
                previous_remaining,
                admission.remaining
            );
            previous_remaining = admission.remaining;
        }
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn remaining_is_monotonically_non_increasing_within_a_window(
        calls in 1usize..40,
        limit in 1u64..50,
    ) {
        run_remaining_is_monotonically_non_increasing(calls, limit);
    }
}
