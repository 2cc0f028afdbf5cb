//! Thin axum binary exposing the LLM dispatch core (`llm-dispatcher`)
//! over HTTP. Owns no business logic beyond request/response
//! (de)serialization and status-code mapping from `DispatchError`,
//! mirroring the way the pack's own axum example wires a resilience-
//! wrapped service into a router.

mod config;
mod error;
mod routes;

use axum::routing::{get, post};
use axum::Router;
use llm_dispatcher::{Dispatcher, DispatcherConfig};
use llm_queue::{PriorityQueue, QueueConfigBuilder};
use llm_registry::Registry;
use llm_selector::Selector;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let metrics = Arc::new(config::build_metrics());
    let rate_limiter = Arc::new(config::build_rate_limiter());
    let cache = Arc::new(config::build_cache_from_env());

    let mut registry = Registry::new();
    config::register_backends(&mut registry);
    let registry = Arc::new(registry);

    let selector = Arc::new(Selector::new(Arc::clone(&registry), Arc::clone(&metrics), Arc::clone(&rate_limiter)));

    let queue_config = QueueConfigBuilder::new()
        .max_concurrent(env_usize("LLM_MAX_CONCURRENT", 5))
        .default_exec_timeout(Duration::from_secs(env_u64("LLM_DEFAULT_EXEC_TIMEOUT_SECS", 500)))
        .stats_log_interval(Duration::from_secs(env_u64("LLM_STATS_LOG_INTERVAL_SECS", 30)))
        .build();
    let queue = Arc::new(PriorityQueue::new(queue_config));

    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        selector,
        queue,
        cache,
        metrics,
        rate_limiter,
        DispatcherConfig::from_env(),
    ));

    let addr = config::bind_addr();
    let listener = TcpListener::bind(&addr).await.expect("failed to bind server address");
    tracing::info!(%addr, "llm-server listening");

    axum::serve(listener, app(dispatcher).into_make_service())
        .await
        .expect("server error");
}

fn app(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/generate", post(routes::generate))
        .route("/embed", post(routes::embed))
        .route("/metrics", get(routes::metrics))
        .route("/models", get(routes::models))
        .route("/reset-rate-limit", post(routes::reset_rate_limit))
        .with_state(dispatcher)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
