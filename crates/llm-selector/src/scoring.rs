//! Weighted-average scoring adjusted by live success rate and latency.

use llm_backend::{Characteristics, Weights};

/// `score = weighted_average(characteristics, weights)` scaled by a
/// success-rate factor in `[0.1, 1.0]` and a latency factor in
/// `[0.1, 2.0]`, clamped to a floor of `0.1` so a backend with some
/// signal never scores at absolute zero (which would make it
/// indistinguishable from "never seen").
pub fn score(
    characteristics: &Characteristics,
    weights: &Weights,
    success_rate_pct: f64,
    avg_latency_secs: f64,
) -> f64 {
    let base = characteristics.weighted_average(weights);

    let success_factor = (success_rate_pct / 100.0).clamp(0.1, 1.0);

    let latency_factor = if avg_latency_secs > 0.0 {
        (1.0 / avg_latency_secs).clamp(0.1, 2.0)
    } else {
        2.0
    };

    (base * success_factor * latency_factor).max(0.1)
}
