//! The smart dispatcher (C8): glues the registry, selector, queue,
//! cache, metrics recorder and rate limiter into one
//! `SmartGenerate`/`SmartEmbed` surface. Constructed last, from the
//! other components built up in the order design note 9 lays out:
//! metrics → rate limiter → cache → registry → selector → queue →
//! dispatcher.

use crate::cache_key::{embed_key, generate_key};
use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::streaming::MeteredGenerateStream;
use crate::types::{
    estimate_tokens, CachedEmbed, CachedGenerate, EmbedInput, EmbedOutcome, GenerateOutcome,
    SmartEmbedRequest, SmartGenerateRequest,
};

use llm_backend::{Backend, BackendError, GenerateRequest, TextChunkStream};
use llm_cache::AnyCache;
use llm_metrics::MetricsRecorder;
use llm_queue::{PriorityQueue, TaskKind, TaskOutput, TaskStatus, Work};
use llm_ratelimiter::{retry_after_secs, RateLimiter};
use llm_registry::Registry;
use llm_selector::{fingerprint, score, seed_for_kind, Operation, Selector};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Internal marker prepended to a task's failure string when the
/// underlying `BackendError` is fallback-eligible (per
/// `BackendError::is_fallback_eligible`: transport failure, or a 5xx
/// provider response); `llm-queue`'s `Work` closure returns a plain
/// `String` on failure, so this is how that one bit of structure
/// survives the trip through the queue.
const FALLBACK_ELIGIBLE_PREFIX: &str = "\u{0}fallback-eligible\u{0}";

/// Marker carrying a `ProviderError`'s status code through the same
/// string channel, followed by `<status>\u{0}<body>`, so a 4xx that
/// never enters the fallback branch still surfaces with its real status
/// instead of a synthetic `0`.
const PROVIDER_STATUS_PREFIX: &str = "\u{0}provider-status\u{0}";

/// Encodes a failed adapter call's error for the trip through
/// `llm-queue`'s string error channel, preserving fallback-eligibility
/// and (for `ProviderError`) the status code.
fn encode_backend_failure(err: &BackendError) -> String {
    let body = match err {
        BackendError::ProviderError { status, body } => {
            format!("{PROVIDER_STATUS_PREFIX}{status}\u{0}{body}")
        }
        other => other.to_string(),
    };
    if err.is_fallback_eligible() {
        format!("{FALLBACK_ELIGIBLE_PREFIX}{body}")
    } else {
        body
    }
}

/// Reconstructs a `DispatchError` from the non-eligibility-prefix
/// portion of a task failure string, recovering the original provider
/// status code when present.
fn decode_backend_failure(message: &str) -> DispatchError {
    if let Some(rest) = message.strip_prefix(PROVIDER_STATUS_PREFIX) {
        if let Some((status, body)) = rest.split_once('\u{0}') {
            if let Ok(status) = status.parse() {
                return DispatchError::ProviderError { status, body: body.to_string() };
            }
        }
    }
    DispatchError::BackendUnavailable(message.to_string())
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    selector: Arc<Selector>,
    queue: Arc<PriorityQueue>,
    cache: Arc<AnyCache>,
    metrics: Arc<MetricsRecorder>,
    rate_limiter: Arc<RateLimiter>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        selector: Arc<Selector>,
        queue: Arc<PriorityQueue>,
        cache: Arc<AnyCache>,
        metrics: Arc<MetricsRecorder>,
        rate_limiter: Arc<RateLimiter>,
        config: DispatcherConfig,
    ) -> Self {
        queue.start();
        Self {
            registry,
            selector,
            queue,
            cache,
            metrics,
            rate_limiter,
            config,
        }
    }

    // ---- generate (non-streaming, queued) ----------------------------

    pub async fn smart_generate(
        &self,
        request: SmartGenerateRequest,
    ) -> Result<GenerateOutcome, DispatchError> {
        let cache_key = request
            .use_cache
            .then(|| generate_key(&request.prompt, request.max_tokens, request.temperature));

        if let Some(key) = &cache_key {
            if let Some(bytes) = self.cache.get(key).await {
                if let Ok(cached) = serde_json::from_slice::<CachedGenerate>(&bytes) {
                    return Ok(GenerateOutcome {
                        text: cached.text,
                        model_used: cached.model_used,
                        processing_time: Duration::ZERO,
                        token_estimate: cached.token_estimate,
                        cached: true,
                    });
                }
            }
        }

        if let Some(caller_id) = &request.caller_id {
            self.admit(caller_id, "generate", self.config.generate_rate_limit, self.config.generate_rate_window)
                .await?;
        }

        let first_backend = self
            .selector
            .select_backend(&request.prompt, Operation::Generate, request.preferred_backend.as_deref())
            .await?;

        let mut tried = HashSet::new();
        let mut backend_id = first_backend;
        let mut last_err: Option<DispatchError> = None;

        for attempt in 0..self.config.max_fallback_attempts {
            tried.insert(backend_id.clone());

            let work = self.build_generate_work(&backend_id, &request, cache_key.clone());
            let result = self
                .queue
                .enqueue(TaskKind::Generate, backend_id.clone(), request.priority, request.timeout, work)
                .await?;

            match result.status {
                TaskStatus::Completed => {
                    let text = match result.output {
                        Some(TaskOutput::Text(text)) => text,
                        _ => String::new(),
                    };
                    let tokens = estimate_tokens(&text);
                    return Ok(GenerateOutcome {
                        text,
                        model_used: backend_id,
                        processing_time: result.execution_time,
                        token_estimate: tokens,
                        cached: false,
                    });
                }
                TaskStatus::Timeout => {
                    let err = if result.execution_time.is_zero() {
                        DispatchError::QueueTimeout
                    } else {
                        DispatchError::ExecutionTimeout
                    };
                    return Err(err);
                }
                TaskStatus::Failed => {
                    let message = result.error.unwrap_or_default();
                    if let Some(stripped) = message.strip_prefix(FALLBACK_ELIGIBLE_PREFIX) {
                        last_err = Some(decode_backend_failure(stripped));
                        let is_last_attempt = attempt + 1 >= self.config.max_fallback_attempts;
                        if !is_last_attempt {
                            if let Some(next) = self.pick_fallback(&request.prompt, Operation::Generate, &tried).await {
                                backend_id = next;
                                continue;
                            }
                        }
                        break;
                    }
                    return Err(decode_backend_failure(&message));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| DispatchError::BackendUnavailable("no backend available".into())))
    }

    /// Bypasses the queue and the cache entirely: selection plus a
    /// direct adapter call, streamed back chunk by chunk. Never retried
    /// mid-stream, per §4.8. `request.timeout` bounds stream
    /// establishment the same way the queue bounds a non-streaming
    /// call's execution, falling back to
    /// `DispatcherConfig::default_stream_timeout` when unset.
    pub async fn smart_generate_stream(
        &self,
        request: SmartGenerateRequest,
    ) -> Result<TextChunkStream, DispatchError> {
        if let Some(caller_id) = &request.caller_id {
            self.admit(caller_id, "generate", self.config.generate_rate_limit, self.config.generate_rate_window)
                .await?;
        }

        let backend_id = self
            .selector
            .select_backend(&request.prompt, Operation::Generate, request.preferred_backend.as_deref())
            .await?;
        let adapter = self.registry.get(Some(&backend_id))?;

        let request_id = self.metrics.record_start(&backend_id, "generate", request.caller_id.clone()).await;
        let gen_request = GenerateRequest {
            prompt: request.prompt.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
            extra: request.extra.clone(),
        };

        let deadline = request.timeout.unwrap_or(self.config.default_stream_timeout);
        match tokio::time::timeout(deadline, adapter.generate_stream(gen_request, CancellationToken::new())).await {
            Ok(Ok(stream)) => Ok(Box::pin(MeteredGenerateStream::new(stream, Arc::clone(&self.metrics), request_id))),
            Ok(Err(err)) => {
                let _ = self.metrics.record_end(&request_id, false, 0.0, None, Some(err.to_string())).await;
                Err(err.into())
            }
            Err(_) => {
                let latency_ms = deadline.as_secs_f64() * 1000.0;
                let _ = self
                    .metrics
                    .record_end(&request_id, false, latency_ms, None, Some("execution deadline exceeded".to_string()))
                    .await;
                Err(DispatchError::ExecutionTimeout)
            }
        }
    }

    /// Queue- and scoring-bypassing single-backend call, for health
    /// checks, admin tooling, and callers that already know exactly
    /// which backend they want.
    pub async fn direct_generate(
        &self,
        backend_id: Option<&str>,
        request: GenerateRequest,
    ) -> Result<String, DispatchError> {
        let adapter = self.registry.get(backend_id)?;
        let request_id = self.metrics.record_start(adapter.id(), "generate", None).await;
        let started = Instant::now();
        match adapter.generate(request, CancellationToken::new()).await {
            Ok(text) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                let tokens = estimate_tokens(&text);
                let _ = self.metrics.record_end(&request_id, true, latency_ms, Some(tokens), None).await;
                Ok(text)
            }
            Err(err) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                let _ = self.metrics.record_end(&request_id, false, latency_ms, None, Some(err.to_string())).await;
                Err(err.into())
            }
        }
    }

    // ---- embed ---------------------------------------------------------

    pub async fn smart_embed(&self, request: SmartEmbedRequest) -> Result<EmbedOutcome, DispatchError> {
        let texts = request.input.as_texts();
        let cache_key = request.use_cache.then(|| embed_key(&texts));

        if let Some(key) = &cache_key {
            if let Some(bytes) = self.cache.get(key).await {
                if let Ok(cached) = serde_json::from_slice::<CachedEmbed>(&bytes) {
                    let dims = cached.embeddings.first().map(|v| v.len()).unwrap_or(0);
                    return Ok(EmbedOutcome {
                        embeddings: cached.embeddings,
                        model_used: cached.model_used,
                        processing_time: Duration::ZERO,
                        dimensions: dims,
                        cached: true,
                    });
                }
            }
        }

        if let Some(caller_id) = &request.caller_id {
            self.admit(caller_id, "embed", self.config.embed_rate_limit, self.config.embed_rate_window)
                .await?;
        }

        let joined = texts.join(" ");
        let first_backend = self
            .selector
            .select_backend(&joined, Operation::Embed, request.preferred_backend.as_deref())
            .await?;

        let mut tried = HashSet::new();
        let mut backend_id = first_backend;
        let mut last_err: Option<DispatchError> = None;

        for attempt in 0..self.config.max_fallback_attempts {
            tried.insert(backend_id.clone());

            let work = self.build_embed_work(&backend_id, texts.clone(), cache_key.clone());
            let result = self
                .queue
                .enqueue(TaskKind::Embed, backend_id.clone(), request.priority, request.timeout, work)
                .await?;

            match result.status {
                TaskStatus::Completed => {
                    let embeddings = match result.output {
                        Some(TaskOutput::Embeddings(e)) => e,
                        _ => Vec::new(),
                    };
                    let dims = embeddings.first().map(|v| v.len()).unwrap_or(0);
                    return Ok(EmbedOutcome {
                        embeddings,
                        model_used: backend_id,
                        processing_time: result.execution_time,
                        dimensions: dims,
                        cached: false,
                    });
                }
                TaskStatus::Timeout => {
                    let err = if result.execution_time.is_zero() {
                        DispatchError::QueueTimeout
                    } else {
                        DispatchError::ExecutionTimeout
                    };
                    return Err(err);
                }
                TaskStatus::Failed => {
                    let message = result.error.unwrap_or_default();
                    if let Some(stripped) = message.strip_prefix(FALLBACK_ELIGIBLE_PREFIX) {
                        last_err = Some(decode_backend_failure(stripped));
                        let is_last_attempt = attempt + 1 >= self.config.max_fallback_attempts;
                        if !is_last_attempt {
                            if let Some(next) = self.pick_fallback(&joined, Operation::Embed, &tried).await {
                                backend_id = next;
                                continue;
                            }
                        }
                        break;
                    }
                    return Err(decode_backend_failure(&message));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| DispatchError::BackendUnavailable("no backend available".into())))
    }

    pub async fn direct_embed(
        &self,
        backend_id: Option<&str>,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, DispatchError> {
        let adapter = self.registry.get(backend_id)?;
        let request_id = self.metrics.record_start(adapter.id(), "embed", None).await;
        let started = Instant::now();
        match adapter.embed(texts, CancellationToken::new()).await {
            Ok(embeddings) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                let _ = self.metrics.record_end(&request_id, true, latency_ms, None, None).await;
                Ok(embeddings)
            }
            Err(err) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                let _ = self.metrics.record_end(&request_id, false, latency_ms, None, Some(err.to_string())).await;
                Err(err.into())
            }
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn queue(&self) -> &Arc<PriorityQueue> {
        &self.queue
    }

    // ---- internals -----------------------------------------------------

    async fn admit(&self, caller_id: &str, category: &str, limit: u64, window: Duration) -> Result<(), DispatchError> {
        let admission = self.rate_limiter.check_and_consume(caller_id, category, limit, window).await;
        if admission.allowed {
            Ok(())
        } else {
            Err(DispatchError::RateLimited {
                retry_after_secs: retry_after_secs(admission.reset_at_unix_ms),
                reset_at_unix_ms: admission.reset_at_unix_ms,
            })
        }
    }

    /// Ranks the remaining, not-yet-tried backends the same way the
    /// selector's own scoring step does, restricted to the exclusion
    /// set a failed attempt has accumulated so far.
    async fn pick_fallback(&self, prompt: &str, operation: Operation, exclude: &HashSet<String>) -> Option<String> {
        let mut candidates: Vec<String> = self
            .registry
            .ids()
            .into_iter()
            .filter(|id| !exclude.contains(id))
            .collect();
        candidates.sort();
        if candidates.is_empty() {
            return None;
        }
        if operation == Operation::Embed {
            return candidates.into_iter().next();
        }

        let fp = fingerprint(prompt);
        let descriptors = self.registry.list();
        let mut best: Option<(String, f64)> = None;
        for id in candidates {
            let Some(descriptor) = descriptors.iter().find(|d| d.id == id) else {
                continue;
            };
            let characteristics = seed_for_kind(descriptor.kind);
            let aggregates = self.metrics.get_aggregates(&id, "generate", llm_metrics::Period::Today).await;
            let candidate_score = score(&characteristics, &fp.weights, aggregates.success_rate, aggregates.avg_latency_ms / 1000.0);
            if best.as_ref().map(|(_, s)| candidate_score > *s).unwrap_or(true) {
                best = Some((id, candidate_score));
            }
        }
        best.map(|(id, _)| id)
    }

    fn build_generate_work(&self, backend_id: &str, request: &SmartGenerateRequest, cache_key: Option<String>) -> Work {
        let registry = Arc::clone(&self.registry);
        let metrics = Arc::clone(&self.metrics);
        let cache = Arc::clone(&self.cache);
        let cache_ttl = self.config.generate_cache_ttl;
        let backend_id = backend_id.to_string();
        let prompt = request.prompt.clone();
        let max_tokens = request.max_tokens;
        let temperature = request.temperature;
        let extra = request.extra.clone();
        let caller_id = request.caller_id.clone();

        Box::pin(async move {
            let request_id = metrics.record_start(&backend_id, "generate", caller_id).await;
            let started = Instant::now();

            let adapter = match registry.get(Some(&backend_id)) {
                Ok(adapter) => adapter,
                Err(err) => {
                    let _ = metrics.record_end(&request_id, false, 0.0, None, Some(err.to_string())).await;
                    return Err(err.to_string());
                }
            };

            let gen_request = GenerateRequest { prompt, max_tokens, temperature, stream: false, extra };
            match adapter.generate(gen_request, CancellationToken::new()).await {
                Ok(text) => {
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    let tokens = estimate_tokens(&text);
                    let _ = metrics.record_end(&request_id, true, latency_ms, Some(tokens), None).await;

                    if let Some(key) = cache_key {
                        let cached = CachedGenerate { text: text.clone(), model_used: backend_id, token_estimate: tokens };
                        if let Ok(bytes) = serde_json::to_vec(&cached) {
                            cache.set(&key, bytes, cache_ttl).await;
                        }
                    }
                    Ok(TaskOutput::Text(text))
                }
                Err(err) => {
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    let _ = metrics.record_end(&request_id, false, latency_ms, None, Some(err.to_string())).await;
                    Err(encode_backend_failure(&err))
                }
            }
        })
    }

    fn build_embed_work(&self, backend_id: &str, texts: Vec<String>, cache_key: Option<String>) -> Work {
        let registry = Arc::clone(&self.registry);
        let metrics = Arc::clone(&self.metrics);
        let cache = Arc::clone(&self.cache);
        let cache_ttl = self.config.embed_cache_ttl;
        let backend_id = backend_id.to_string();

        Box::pin(async move {
            let request_id = metrics.record_start(&backend_id, "embed", None).await;
            let started = Instant::now();

            let adapter = match registry.get(Some(&backend_id)) {
                Ok(adapter) => adapter,
                Err(err) => {
                    let _ = metrics.record_end(&request_id, false, 0.0, None, Some(err.to_string())).await;
                    return Err(err.to_string());
                }
            };

            match adapter.embed(texts, CancellationToken::new()).await {
                Ok(embeddings) => {
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    let _ = metrics.record_end(&request_id, true, latency_ms, None, None).await;

                    if let Some(key) = cache_key {
                        let cached = CachedEmbed { embeddings: embeddings.clone(), model_used: backend_id };
                        if let Ok(bytes) = serde_json::to_vec(&cached) {
                            cache.set(&key, bytes, cache_ttl).await;
                        }
                    }
                    Ok(TaskOutput::Embeddings(embeddings))
                }
                Err(err) => {
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    let _ = metrics.record_end(&request_id, false, latency_ms, None, Some(err.to_string())).await;
                    Err(encode_backend_failure(&err))
                }
            }
        })
    }
}

/// Convenience used by the binary and by a non-smart `route_generate`
/// caller that wants the plain adapter call without scoring, caching,
/// or queueing machinery at all.
pub async fn route_generate(
    registry: &Arc<Registry>,
    metrics: &Arc<MetricsRecorder>,
    backend_id: Option<&str>,
    request: GenerateRequest,
) -> Result<String, DispatchError> {
    let adapter: Arc<dyn Backend> = registry.get(backend_id)?;
    let request_id = metrics.record_start(adapter.id(), "generate", None).await;
    let started = Instant::now();
    match adapter.generate(request, CancellationToken::new()).await {
        Ok(text) => {
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            let tokens = estimate_tokens(&text);
            let _ = metrics.record_end(&request_id, true, latency_ms, Some(tokens), None).await;
            Ok(text)
        }
        Err(err) => {
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            let _ = metrics.record_end(&request_id, false, latency_ms, None, Some(err.to_string())).await;
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm_backend::BackendKind;
    use llm_cache::{build_cache, ShardingStrategy};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A `Backend` whose every call returns the same scripted outcome,
    /// counting how many times it was invoked. Stands in for a real
    /// adapter in tests that need to control exactly what a backend
    /// returns rather than reaching a live provider.
    struct ScriptedBackend {
        id: String,
        calls: AtomicUsize,
        outcome: Result<String, BackendError>,
    }

    impl ScriptedBackend {
        fn failing(id: &str, status: u16) -> Self {
            Self {
                id: id.into(),
                calls: AtomicUsize::new(0),
                outcome: Err(BackendError::ProviderError { status, body: "boom".into() }),
            }
        }

        fn succeeding(id: &str, text: &str) -> Self {
            Self {
                id: id.into(),
                calls: AtomicUsize::new(0),
                outcome: Ok(text.to_string()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        fn id(&self) -> &str {
            &self.id
        }

        async fn generate(&self, _request: GenerateRequest, _cancel: CancellationToken) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Ok(text) => Ok(text.clone()),
                Err(BackendError::ProviderError { status, body }) => {
                    Err(BackendError::ProviderError { status: *status, body: body.clone() })
                }
                Err(other) => Err(BackendError::Unavailable(other.to_string())),
            }
        }

        async fn generate_stream(&self, request: GenerateRequest, cancel: CancellationToken) -> Result<TextChunkStream, BackendError> {
            self.generate(request, cancel).await.map(llm_backend::stream::single_chunk)
        }

        async fn embed(&self, _texts: Vec<String>, _cancel: CancellationToken) -> Result<Vec<Vec<f32>>, BackendError> {
            unimplemented!("not exercised by the tests that use ScriptedBackend")
        }
    }

    fn dispatcher_with_backends(backends: Vec<(Arc<ScriptedBackend>, bool)>) -> Dispatcher {
        let mut registry = Registry::new();
        for (backend, is_default) in backends {
            let id = backend.id.clone();
            registry.register_adapter(id.clone(), backend, BackendKind::RemoteHttpChat, format!("{id}-model"), is_default);
        }
        let registry = Arc::new(registry);
        let metrics = Arc::new(MetricsRecorder::in_memory());
        let rate_limiter = Arc::new(RateLimiter::in_memory());
        let selector = Arc::new(Selector::new(Arc::clone(&registry), Arc::clone(&metrics), Arc::clone(&rate_limiter)));
        let cache = Arc::new(build_cache(vec![], ShardingStrategy::ByKey));
        let queue = Arc::new(PriorityQueue::new(llm_queue::QueueConfigBuilder::new().max_concurrent(4).build()));
        let config = DispatcherConfig::builder().build();
        Dispatcher::new(registry, selector, queue, cache, metrics, rate_limiter, config)
    }

    #[tokio::test]
    async fn backend_fallback_tries_next_backend_after_a_5xx_provider_error() {
        let b1 = Arc::new(ScriptedBackend::failing("b1", 503));
        let b2 = Arc::new(ScriptedBackend::succeeding("b2", "ok from b2"));
        let dispatcher = dispatcher_with_backends(vec![(Arc::clone(&b1), true), (Arc::clone(&b2), false)]);

        let request = SmartGenerateRequest {
            prompt: "hello".into(),
            preferred_backend: Some("b1".into()),
            use_cache: false,
            ..Default::default()
        };
        let outcome = dispatcher.smart_generate(request).await.unwrap();

        assert_eq!(outcome.text, "ok from b2");
        assert_eq!(outcome.model_used, "b2");
        assert_eq!(b1.call_count(), 1);
        assert_eq!(b2.call_count(), 1);
    }

    #[tokio::test]
    async fn a_4xx_provider_error_surfaces_immediately_without_trying_fallback() {
        let b1 = Arc::new(ScriptedBackend::failing("b1", 400));
        let b2 = Arc::new(ScriptedBackend::succeeding("b2", "ok from b2"));
        let dispatcher = dispatcher_with_backends(vec![(Arc::clone(&b1), true), (Arc::clone(&b2), false)]);

        let request = SmartGenerateRequest {
            prompt: "hello".into(),
            preferred_backend: Some("b1".into()),
            use_cache: false,
            ..Default::default()
        };
        let err = dispatcher.smart_generate(request).await.unwrap_err();

        match err {
            DispatchError::ProviderError { status, .. } => assert_eq!(status, 400),
            other => panic!("expected ProviderError{{400}}, got {other:?}"),
        }
        assert_eq!(b1.call_count(), 1);
        assert_eq!(b2.call_count(), 0);
    }

    fn bare_dispatcher() -> Dispatcher {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(MetricsRecorder::in_memory());
        let rate_limiter = Arc::new(RateLimiter::in_memory());
        let selector = Arc::new(Selector::new(Arc::clone(&registry), Arc::clone(&metrics), Arc::clone(&rate_limiter)));
        let cache = Arc::new(build_cache(vec![], ShardingStrategy::ByKey));
        let queue = Arc::new(PriorityQueue::new(llm_queue::QueueConfigBuilder::new().max_concurrent(4).build()));
        let config = DispatcherConfig::builder().build();
        Dispatcher::new(registry, selector, queue, cache, metrics, rate_limiter, config)
    }

    #[tokio::test]
    async fn generate_with_no_registered_backends_surfaces_no_such_backend() {
        let dispatcher = bare_dispatcher();
        let request = SmartGenerateRequest {
            prompt: "hello".into(),
            use_cache: false,
            ..Default::default()
        };
        let err = dispatcher.smart_generate(request).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoSuchBackend(_)));
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_before_backend_selection() {
        let dispatcher = bare_dispatcher();
        let key = generate_key("what is 2+2", 16, 0.0);
        let cached = CachedGenerate { text: "4".into(), model_used: "b1".into(), token_estimate: 1 };
        dispatcher
            .cache
            .set(&key, serde_json::to_vec(&cached).unwrap(), Duration::from_secs(60))
            .await;

        let request = SmartGenerateRequest {
            prompt: "what is 2+2".into(),
            max_tokens: 16,
            temperature: 0.0,
            use_cache: true,
            ..Default::default()
        };
        let outcome = dispatcher.smart_generate(request).await.unwrap();
        assert_eq!(outcome.text, "4");
        assert!(outcome.cached);
    }

    #[tokio::test]
    async fn rate_limit_denial_surfaces_before_backend_selection() {
        let dispatcher = bare_dispatcher();
        for _ in 0..60 {
            dispatcher.rate_limiter.check_and_consume("u1", "generate", 60, Duration::from_secs(60)).await;
        }
        let request = SmartGenerateRequest {
            prompt: "hi".into(),
            caller_id: Some("u1".into()),
            use_cache: false,
            ..Default::default()
        };
        let err = dispatcher.smart_generate(request).await.unwrap_err();
        match err {
            DispatchError::RateLimited { retry_after_secs, .. } => assert!(retry_after_secs >= 1),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn embed_cache_hit_reports_dimensions_from_the_stored_vector() {
        let dispatcher = bare_dispatcher();
        let key = embed_key(&["hello".to_string()]);
        let cached = CachedEmbed { embeddings: vec![vec![0.1, 0.2, 0.3]], model_used: "b1".into() };
        dispatcher
            .cache
            .set(&key, serde_json::to_vec(&cached).unwrap(), Duration::from_secs(60))
            .await;

        let request = SmartEmbedRequest {
            input: EmbedInput::Single("hello".into()),
            use_cache: true,
            ..Default::default()
        };
        let outcome = dispatcher.smart_embed(request).await.unwrap();
        assert_eq!(outcome.dimensions, 3);
        assert!(outcome.cached);
    }
}
