//! Startup-time wiring: reads the environment into the component
//! configs and backend list, following the construction order design
//! note — metrics, then rate limiter, then cache, then registry, then
//! selector, then queue, then dispatcher.

use llm_backend::{BackendConfig, BackendKind};
use llm_cache::{build_cache, AnyCache, ShardingStrategy};
use llm_metrics::MetricsRecorder;
use llm_ratelimiter::RateLimiter;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// One entry of the `LLM_BACKENDS` JSON array.
#[derive(Debug, Deserialize)]
struct BackendSpec {
    id: String,
    kind: BackendKindWire,
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    api_key: Option<String>,
    model_name: String,
    #[serde(default)]
    embedding_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    default_max_tokens: u32,
    #[serde(default = "default_temperature")]
    default_temperature: f32,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default)]
    local_path: Option<String>,
    #[serde(default)]
    is_default: bool,
}

fn default_max_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.7
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
enum BackendKindWire {
    LocalFile,
    RemoteHttpChat,
    RemoteHttpCompletion,
    RemoteHttpProxy,
}

impl From<BackendKindWire> for BackendKind {
    fn from(wire: BackendKindWire) -> Self {
        match wire {
            BackendKindWire::LocalFile => BackendKind::LocalFile,
            BackendKindWire::RemoteHttpChat => BackendKind::RemoteHttpChat,
            BackendKindWire::RemoteHttpCompletion => BackendKind::RemoteHttpCompletion,
            BackendKindWire::RemoteHttpProxy => BackendKind::RemoteHttpProxy,
        }
    }
}

/// Reads `LLM_BACKENDS` (a JSON array of [`BackendSpec`]) and registers
/// each one. Falls back to a single local-file backend named `local` if
/// the variable is unset, so the binary still starts for a quick smoke
/// test without any remote provider configured.
pub fn register_backends(registry: &mut llm_registry::Registry) {
    let specs: Vec<BackendSpec> = match std::env::var("LLM_BACKENDS") {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::error!(%err, "LLM_BACKENDS did not parse, starting with no backends");
            Vec::new()
        }),
        Err(_) => vec![BackendSpec {
            id: "local".to_string(),
            kind: BackendKindWire::LocalFile,
            endpoint: String::new(),
            api_key: None,
            model_name: "canned".to_string(),
            embedding_model: None,
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            local_path: Some("./local-model.json".to_string()),
            is_default: true,
        }],
    };

    for spec in specs {
        let config = BackendConfig {
            kind: spec.kind.into(),
            endpoint: spec.endpoint,
            api_key: spec.api_key,
            model_name: spec.model_name,
            embedding_model: spec.embedding_model,
            default_max_tokens: spec.default_max_tokens,
            default_temperature: spec.default_temperature,
            request_timeout: Duration::from_secs(spec.request_timeout_secs),
            local_path: spec.local_path,
        };
        let id = spec.id.clone();
        if let Err(err) = registry.register(spec.id, config, spec.is_default) {
            tracing::error!(backend = %id, %err, "failed to register backend");
        }
    }
}

/// `LLM_METRICS_REDIS_URL` selects a Redis-backed metrics store; unset
/// falls back to the in-memory recorder.
pub fn build_metrics() -> MetricsRecorder {
    match std::env::var("LLM_METRICS_REDIS_URL") {
        Ok(url) => match llm_metrics::RedisStore::open(&url) {
            Ok(store) => MetricsRecorder::new(Arc::new(store)),
            Err(err) => {
                tracing::error!(%err, "could not open metrics redis store, using in-memory");
                MetricsRecorder::in_memory()
            }
        },
        Err(_) => MetricsRecorder::in_memory(),
    }
}

/// `LLM_RATE_LIMIT_REDIS_URL` selects a Redis-backed rate limit store;
/// unset falls back to the in-memory limiter (counters reset on restart).
pub fn build_rate_limiter() -> RateLimiter {
    match std::env::var("LLM_RATE_LIMIT_REDIS_URL") {
        Ok(url) => match llm_ratelimiter::RedisStore::open(&url) {
            Ok(store) => RateLimiter::new(Arc::new(store)),
            Err(err) => {
                tracing::error!(%err, "could not open rate limit redis store, using in-memory");
                RateLimiter::in_memory()
            }
        },
        Err(_) => RateLimiter::in_memory(),
    }
}

/// `LLM_CACHE_REDIS_URLS` is a comma-separated list of node URLs; zero or
/// one yields a single-node cache, more than one a sharded cache keyed
/// by `LLM_CACHE_SHARD_STRATEGY` (`by-key` default, or `by-tenant`).
pub fn build_cache_from_env() -> AnyCache {
    let urls: Vec<String> = std::env::var("LLM_CACHE_REDIS_URLS")
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default();

    let strategy = match std::env::var("LLM_CACHE_SHARD_STRATEGY").as_deref() {
        Ok("by-tenant") => ShardingStrategy::ByTenant,
        _ => ShardingStrategy::ByKey,
    };

    let stores: Vec<Arc<dyn llm_cache::CacheStore>> = urls
        .iter()
        .filter_map(|url| match llm_cache::RedisStore::open(url) {
            Ok(store) => Some(Arc::new(store) as Arc<dyn llm_cache::CacheStore>),
            Err(err) => {
                tracing::error!(%err, url, "could not open cache redis node, skipping");
                None
            }
        })
        .collect();

    build_cache(stores, strategy)
}

pub fn bind_addr() -> String {
    std::env::var("LLM_SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string())
}
