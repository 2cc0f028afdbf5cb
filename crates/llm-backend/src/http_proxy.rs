//! Internal gateway adapter: forwards to a proxy that itself multiplexes to
//! concrete providers. Carries a `target_backend` hint in the request body
//! so the gateway knows which downstream provider to pick.
//!
//! `POST <proxy>/generate` / `POST <proxy>/embed` with `{prompt|text,
//! model_id, max_tokens, temperature, stream}` returning `{text|embedding}`.

use crate::adapter::{Backend, GenerateRequest};
use crate::descriptor::BackendConfig;
use crate::error::BackendError;
use crate::stream::{self, TextChunkStream};
use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

pub struct HttpProxyBackend {
    id: String,
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpProxyBackend {
    pub fn new(id: String, config: BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self { id, client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) if !key.is_empty() => builder.bearer_auth(key),
            _ => builder,
        }
    }
}

async fn send_with_cancel(
    request: reqwest::RequestBuilder,
    cancel: CancellationToken,
) -> Result<reqwest::Response, BackendError> {
    tokio::select! {
        result = request.send() => result.map_err(BackendError::from),
        _ = cancel.cancelled() => Err(BackendError::Cancelled),
    }
}

#[async_trait]
impl Backend for HttpProxyBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<String, BackendError> {
        let body = json!({
            "prompt": request.prompt,
            "model_id": self.config.model_name,
            "target_backend": self.id,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": false,
        });
        let req = self.auth(self.client.post(self.url("/generate")).json(&body));
        let response = send_with_cancel(req, cancel).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::ProviderError { status, body });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::DecodeError(e.to_string()))?;

        value
            .get("text")
            .and_then(|t| t.as_str())
            .map(str::to_owned)
            .ok_or_else(|| BackendError::DecodeError("missing text field".into()))
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<TextChunkStream, BackendError> {
        let body = json!({
            "prompt": request.prompt,
            "model_id": self.config.model_name,
            "target_backend": self.id,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": true,
        });
        let req = self.auth(self.client.post(self.url("/generate")).json(&body));
        let response = send_with_cancel(req, cancel).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::ProviderError { status, body });
        }

        let text = response
            .text()
            .await
            .map_err(|e| BackendError::DecodeError(e.to_string()))?;

        Ok(stream::parse_sse_lines(text, |v| {
            v.get("text").and_then(|t| t.as_str()).map(str::to_owned)
        }))
    }

    async fn embed(
        &self,
        texts: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<Vec<Vec<f32>>, BackendError> {
        let body = json!({
            "text": texts,
            "model_id": self.config.embedding_model.clone().unwrap_or_else(|| self.config.model_name.clone()),
            "target_backend": self.id,
        });
        let req = self.auth(self.client.post(self.url("/embed")).json(&body));
        let response = send_with_cancel(req, cancel).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::ProviderError { status, body });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::DecodeError(e.to_string()))?;

        let embedding = value
            .get("embedding")
            .ok_or_else(|| BackendError::DecodeError("missing embedding field".into()))?;

        // The proxy returns either a single vector (one input text) or a
        // list of vectors (batch); normalize both shapes to Vec<Vec<f32>>.
        if embedding
            .as_array()
            .and_then(|a| a.first())
            .map(|v| v.is_array())
            .unwrap_or(false)
        {
            embedding
                .as_array()
                .unwrap()
                .iter()
                .map(|vec| {
                    vec.as_array()
                        .map(|v| v.iter().filter_map(|n| n.as_f64()).map(|n| n as f32).collect())
                        .ok_or_else(|| BackendError::DecodeError("malformed embedding vector".into()))
                })
                .collect()
        } else {
            let single: Vec<f32> = embedding
                .as_array()
                .ok_or_else(|| BackendError::DecodeError("malformed embedding vector".into()))?
                .iter()
                .filter_map(|n| n.as_f64())
                .map(|n| n as f32)
                .collect();
            Ok(vec![single])
        }
    }
}
