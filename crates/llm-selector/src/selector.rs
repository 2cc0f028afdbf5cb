//! `SelectBackend`: the selector's single public operation.

use crate::characteristics::seed_for_kind;
use crate::error::SelectorError;
use crate::fingerprint::fingerprint;
use crate::scoring::score;
use llm_metrics::{MetricsRecorder, Period};
use llm_ratelimiter::RateLimiter;
use llm_registry::Registry;
use std::sync::Arc;
use std::time::Duration;

/// Backend availability is probed against the rate limiter with a
/// generous budget (100 checks/minute) rather than the caller-facing
/// generate/embed limits, so selection itself never starves real
/// traffic of its own quota.
const PROBE_LIMIT: u64 = 100;
const PROBE_WINDOW: Duration = Duration::from_secs(60);

/// A backend whose recent success rate is this low or lower is treated
/// as "sustained failure" and excluded from selection, provided it has
/// accrued enough samples to be a meaningful signal rather than one
/// unlucky request.
const SUSTAINED_FAILURE_THRESHOLD: f64 = 50.0;
const MIN_SAMPLES_FOR_FAILURE_SIGNAL: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Generate,
    Embed,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Generate => "generate",
            Operation::Embed => "embed",
        }
    }
}

pub struct Selector {
    registry: Arc<Registry>,
    metrics: Arc<MetricsRecorder>,
    rate_limiter: Arc<RateLimiter>,
}

impl Selector {
    pub fn new(
        registry: Arc<Registry>,
        metrics: Arc<MetricsRecorder>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            registry,
            metrics,
            rate_limiter,
        }
    }

    /// Chooses a backend id for `prompt`/`operation`, honoring `preferred`
    /// when given and resolvable. Never returns an id absent from the
    /// registry; only errors when the registry has nothing registered.
    pub async fn select_backend(
        &self,
        prompt: &str,
        operation: Operation,
        preferred: Option<&str>,
    ) -> Result<String, SelectorError> {
        if self.registry.is_empty() {
            return Err(SelectorError::NoBackendsRegistered);
        }

        if let Some(preferred) = preferred {
            if self.registry.contains(preferred) {
                return Ok(preferred.to_string());
            }
        }

        let default_id = self
            .registry
            .default_id()
            .map(str::to_owned)
            .ok_or(SelectorError::NoBackendsRegistered)?;

        let mut candidate_ids = self.registry.ids();
        candidate_ids.sort();

        let mut available = Vec::new();
        for id in &candidate_ids {
            if self.is_available(id, operation).await {
                available.push(id.clone());
            }
        }

        if available.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::warn!("no backend available, falling back to default");
            return Ok(default_id);
        }

        if operation == Operation::Embed {
            return Ok(available[0].clone());
        }

        let fp = fingerprint(prompt);
        let mut best: Option<(String, f64)> = None;

        for id in &available {
            let descriptor = match self.registry.list().into_iter().find(|d| &d.id == id) {
                Some(d) => d,
                None => continue,
            };
            let characteristics = seed_for_kind(descriptor.kind);
            let aggregates = self
                .metrics
                .get_aggregates(id, operation.as_str(), Period::Today)
                .await;
            let backend_score = score(
                &characteristics,
                &fp.weights,
                aggregates.success_rate,
                aggregates.avg_latency_ms / 1000.0,
            );

            if best.as_ref().map(|(_, s)| backend_score > *s).unwrap_or(true) {
                best = Some((id.clone(), backend_score));
            }
        }

        Ok(best.map(|(id, _)| id).unwrap_or(default_id))
    }

    async fn is_available(&self, backend_id: &str, operation: Operation) -> bool {
        let admission = self
            .rate_limiter
            .check_and_consume(backend_id, "check", PROBE_LIMIT, PROBE_WINDOW)
            .await;
        if !admission.allowed {
            return false;
        }

        let aggregates = self
            .metrics
            .get_aggregates(backend_id, operation.as_str(), Period::Today)
            .await;
        if aggregates.request_count >= MIN_SAMPLES_FOR_FAILURE_SIGNAL
            && aggregates.success_rate <= SUSTAINED_FAILURE_THRESHOLD
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_backend::{BackendConfig, BackendKind};

    fn registry_with_two_backends() -> Registry {
        let mut registry = Registry::new();
        let config = |endpoint: &str| BackendConfig {
            kind: BackendKind::RemoteHttpChat,
            endpoint: endpoint.into(),
            api_key: None,
            model_name: "m".into(),
            embedding_model: None,
            default_max_tokens: 256,
            default_temperature: 0.7,
            request_timeout: Duration::from_secs(30),
            local_path: None,
        };
        registry.register("b1", config("http://a"), true).unwrap();
        registry.register("b2", config("http://b"), false).unwrap();
        registry
    }

    #[tokio::test]
    async fn preferred_backend_wins_when_present() {
        let registry = Arc::new(registry_with_two_backends());
        let metrics = Arc::new(MetricsRecorder::in_memory());
        let limiter = Arc::new(RateLimiter::in_memory());
        let selector = Selector::new(registry, metrics, limiter);

        let chosen = selector
            .select_backend("hello", Operation::Generate, Some("b2"))
            .await
            .unwrap();
        assert_eq!(chosen, "b2");
    }

    #[tokio::test]
    async fn unknown_preferred_falls_through_to_scoring() {
        let registry = Arc::new(registry_with_two_backends());
        let metrics = Arc::new(MetricsRecorder::in_memory());
        let limiter = Arc::new(RateLimiter::in_memory());
        let selector = Selector::new(registry, metrics, limiter);

        let chosen = selector
            .select_backend("hello", Operation::Generate, Some("does-not-exist"))
            .await
            .unwrap();
        assert!(chosen == "b1" || chosen == "b2");
    }

    #[tokio::test]
    async fn embed_returns_first_available_without_scoring() {
        let registry = Arc::new(registry_with_two_backends());
        let metrics = Arc::new(MetricsRecorder::in_memory());
        let limiter = Arc::new(RateLimiter::in_memory());
        let selector = Selector::new(registry, metrics, limiter);

        let chosen = selector
            .select_backend("embed this", Operation::Embed, None)
            .await
            .unwrap();
        assert_eq!(chosen, "b1");
    }

    #[tokio::test]
    async fn empty_registry_errors() {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(MetricsRecorder::in_memory());
        let limiter = Arc::new(RateLimiter::in_memory());
        let selector = Selector::new(registry, metrics, limiter);

        let err = selector
            .select_backend("hello", Operation::Generate, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SelectorError::NoBackendsRegistered));
    }

    #[tokio::test]
    async fn sustained_failures_exclude_a_backend_from_selection() {
        let registry = Arc::new(registry_with_two_backends());
        let metrics = Arc::new(MetricsRecorder::in_memory());
        let limiter = Arc::new(RateLimiter::in_memory());

        for _ in 0..10 {
            let id = metrics.record_start("b1", "generate", None).await;
            metrics
                .record_end(&id, false, 10.0, None, Some("boom".into()))
                .await
                .unwrap();
        }

        let selector = Selector::new(registry, metrics, limiter);
        let chosen = selector
            .select_backend("hello there friend", Operation::Generate, None)
            .await
            .unwrap();
        assert_eq!(chosen, "b2");
    }
}
