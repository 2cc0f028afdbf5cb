//! HTTP handlers for the five endpoints §6 documents.

use crate::error::ApiError;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use llm_dispatcher::{Dispatcher, EmbedInput, SmartEmbedRequest, SmartGenerateRequest};
use llm_metrics::Period;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

pub type AppState = Arc<Dispatcher>;

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    prompt: String,
    model_id: Option<String>,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_true")]
    use_cache: bool,
    caller_id: Option<String>,
}

fn default_max_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.7
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    text: String,
    model_used: String,
    processing_time: f64,
    token_estimate: u32,
    cached: bool,
}

pub async fn generate(State(dispatcher): State<AppState>, Json(body): Json<GenerateBody>) -> Result<impl IntoResponse, ApiError> {
    let request = SmartGenerateRequest {
        prompt: body.prompt,
        preferred_backend: body.model_id,
        max_tokens: body.max_tokens,
        temperature: body.temperature,
        use_cache: body.use_cache,
        caller_id: body.caller_id,
        ..Default::default()
    };
    let outcome = dispatcher.smart_generate(request).await?;
    Ok(Json(GenerateResponse {
        text: outcome.text,
        model_used: outcome.model_used,
        processing_time: outcome.processing_time.as_secs_f64(),
        token_estimate: outcome.token_estimate,
        cached: outcome.cached,
    }))
}

/// Either a single string or a batch, matching `Embed(text | list<text>)`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EmbedText {
    Single(String),
    Many(Vec<String>),
}

impl From<EmbedText> for EmbedInput {
    fn from(value: EmbedText) -> Self {
        match value {
            EmbedText::Single(s) => EmbedInput::Single(s),
            EmbedText::Many(v) => EmbedInput::Many(v),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmbedBody {
    text: EmbedText,
    model_id: Option<String>,
    #[serde(default = "default_true")]
    use_cache: bool,
    caller_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmbedResponse {
    embedding: Vec<Vec<f32>>,
    model_used: String,
    processing_time: f64,
    dimensions: usize,
    cached: bool,
}

pub async fn embed(State(dispatcher): State<AppState>, Json(body): Json<EmbedBody>) -> Result<impl IntoResponse, ApiError> {
    let request = SmartEmbedRequest {
        input: body.text.into(),
        preferred_backend: body.model_id,
        use_cache: body.use_cache,
        caller_id: body.caller_id,
        ..Default::default()
    };
    let outcome = dispatcher.smart_embed(request).await?;
    Ok(Json(EmbedResponse {
        embedding: outcome.embeddings,
        model_used: outcome.model_used,
        processing_time: outcome.processing_time.as_secs_f64(),
        dimensions: outcome.dimensions,
        cached: outcome.cached,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MetricsParams {
    model_id: Option<String>,
    #[serde(default)]
    period: PeriodParam,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodParam {
    #[default]
    Today,
    Yesterday,
    Week,
    Month,
}

impl From<PeriodParam> for Period {
    fn from(p: PeriodParam) -> Self {
        match p {
            PeriodParam::Today => Period::Today,
            PeriodParam::Yesterday => Period::Yesterday,
            PeriodParam::Week => Period::Week,
            PeriodParam::Month => Period::Month,
        }
    }
}

pub async fn metrics(State(dispatcher): State<AppState>, Query(params): Query<MetricsParams>) -> impl IntoResponse {
    let period: Period = params.period.into();
    let backend_ids = match &params.model_id {
        Some(id) => vec![id.clone()],
        None => dispatcher.registry().ids(),
    };

    let mut models = HashMap::new();
    let mut total_requests = 0u64;
    let mut success_sum = 0.0;
    let mut latency_sum = 0.0;
    let mut counted = 0u64;

    for backend_id in &backend_ids {
        let generate = dispatcher.metrics().get_aggregates(backend_id, "generate", period).await;
        let embed = dispatcher.metrics().get_aggregates(backend_id, "embed", period).await;
        let requests = generate.request_count + embed.request_count;
        total_requests += requests;
        if requests > 0 {
            success_sum += generate.success_rate * generate.request_count as f64
                + embed.success_rate * embed.request_count as f64;
            latency_sum += generate.avg_latency_ms * generate.request_count as f64
                + embed.avg_latency_ms * embed.request_count as f64;
            counted += requests;
        }
        models.insert(
            backend_id.clone(),
            json!({
                "generate": generate,
                "embed": embed,
            }),
        );
    }

    let success_rate = if counted > 0 { success_sum / counted as f64 } else { 100.0 };
    let avg_latency = if counted > 0 { latency_sum / counted as f64 } else { 1.0 };

    Json(json!({
        "models": models,
        "total_requests": total_requests,
        "success_rate": success_rate,
        "avg_latency": avg_latency,
    }))
}

pub async fn models(State(dispatcher): State<AppState>) -> impl IntoResponse {
    let descriptors = dispatcher.registry().list();
    let default_model = dispatcher.registry().default_id().map(str::to_string);
    Json(json!({
        "models": descriptors,
        "default_model": default_model,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResetRateLimitBody {
    user_id: String,
}

pub async fn reset_rate_limit(State(dispatcher): State<AppState>, Json(body): Json<ResetRateLimitBody>) -> impl IntoResponse {
    dispatcher.rate_limiter().reset(&body.user_id, "generate").await;
    dispatcher.rate_limiter().reset(&body.user_id, "embed").await;
    Json(json!({
        "message": "rate limit reset",
        "user_id": body.user_id,
    }))
}
