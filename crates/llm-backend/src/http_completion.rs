//! Legacy completions style remote HTTP provider.
//!
//! `POST <endpoint>/completions` with `{model, prompt, max_tokens,
//! temperature, stream}`; response `choices[0].text`.

use crate::adapter::{Backend, GenerateRequest};
use crate::descriptor::BackendConfig;
use crate::error::BackendError;
use crate::stream::{self, TextChunkStream};
use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

pub struct HttpCompletionBackend {
    id: String,
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpCompletionBackend {
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
impl Backend for HttpCompletionBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<String, BackendError> {
        let body = json!({
            "model": self.config.model_name,
            "prompt": request.prompt,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": false,
        });
        let req = self.auth(self.client.post(self.url("/completions")).json(&body));
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
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
            .and_then(|c| c.as_str())
            .map(str::to_owned)
            .ok_or_else(|| BackendError::DecodeError("missing choices[0].text".into()))
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<TextChunkStream, BackendError> {
        let body = json!({
            "model": self.config.model_name,
            "prompt": request.prompt,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": true,
        });
        let req = self.auth(self.client.post(self.url("/completions")).json(&body));
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
            v.get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("text"))
                .and_then(|c| c.as_str())
                .map(str::to_owned)
        }))
    }

    async fn embed(
        &self,
        texts: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<Vec<Vec<f32>>, BackendError> {
        let model = self
            .config
            .embedding_model
            .clone()
            .unwrap_or_else(|| self.config.model_name.clone());
        let body = json!({ "model": model, "input": texts });
        let req = self.auth(self.client.post(self.url("/embeddings")).json(&body));
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

        let data = value
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| BackendError::DecodeError("missing data array".into()))?;

        data.iter()
            .map(|entry| {
                entry
                    .get("embedding")
                    .and_then(|e| e.as_array())
                    .map(|vec| {
                        vec.iter()
                            .filter_map(|n| n.as_f64())
                            .map(|n| n as f32)
                            .collect()
                    })
                    .ok_or_else(|| BackendError::DecodeError("missing embedding vector".into()))
            })
            .collect()
    }
}
