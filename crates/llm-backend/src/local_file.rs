//! Local-file adapter: weights or a static response table loaded from disk.
//!
//! Runs on a dedicated `spawn_blocking` pool rather than the async reactor,
//! per the redesign note on coroutine/thread-hop backends, but its public
//! contract is identical to the HTTP-backed adapters: same trait, same
//! error kinds, same cancellation/deadline handling.

use crate::adapter::{Backend, GenerateRequest};
use crate::descriptor::BackendConfig;
use crate::error::BackendError;
use crate::stream::{self, TextChunkStream};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A static prompt → response table, the simplest possible "model":
/// one JSON object on disk mapping a prompt (or a default `"*"` key) to
/// canned text. Real weight-backed local inference is out of scope for
/// this crate; this adapter exists to give local-file backends a faithful
/// contract-identical implementation rather than a stub that always errors.
#[derive(Debug, Clone, serde::Deserialize)]
struct ResponseTable {
    #[serde(flatten)]
    entries: HashMap<String, String>,
}

pub struct LocalFileBackend {
    id: String,
    config: BackendConfig,
    table: Arc<ResponseTable>,
}

impl LocalFileBackend {
    pub fn new(id: String, config: BackendConfig) -> Self {
        let table = config
            .local_path
            .as_deref()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or(ResponseTable {
                entries: HashMap::new(),
            });
        Self {
            id,
            config,
            table: Arc::new(table),
        }
    }
}

async fn run_blocking<F, T>(f: F, cancel: CancellationToken) -> Result<T, BackendError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);
    tokio::select! {
        result = handle => result.map_err(|e| BackendError::Unavailable(e.to_string())),
        _ = cancel.cancelled() => Err(BackendError::Cancelled),
    }
}

#[async_trait]
impl Backend for LocalFileBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<String, BackendError> {
        let table = Arc::clone(&self.table);
        let model = self.config.model_name.clone();
        let prompt = request.prompt;
        run_blocking(
            move || {
                table
                    .entries
                    .get(&prompt)
                    .or_else(|| table.entries.get("*"))
                    .cloned()
                    .unwrap_or_else(|| format!("[{model}] {prompt}"))
            },
            cancel,
        )
        .await
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<TextChunkStream, BackendError> {
        let text = self.generate(request, cancel).await?;
        Ok(stream::single_chunk(text))
    }

    async fn embed(
        &self,
        texts: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<Vec<Vec<f32>>, BackendError> {
        run_blocking(
            move || {
                texts
                    .into_iter()
                    .map(|text| deterministic_embedding(&text, 8))
                    .collect()
            },
            cancel,
        )
        .await
    }
}

/// Stand-in embedding: a fixed-length vector derived from a simple hash of
/// the input, stable across calls, since there is no real local model
/// behind this adapter. Not intended to carry semantic meaning.
fn deterministic_embedding(text: &str, dims: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    (0..dims)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let bits = hasher.finish();
            ((bits % 2000) as f32 / 1000.0) - 1.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> BackendConfig {
        BackendConfig {
            kind: crate::descriptor::BackendKind::LocalFile,
            endpoint: String::new(),
            api_key: None,
            model_name: "local-small".into(),
            embedding_model: None,
            default_max_tokens: 256,
            default_temperature: 0.7,
            request_timeout: Duration::from_secs(5),
            local_path: None,
        }
    }

    #[tokio::test]
    async fn falls_back_to_echoing_the_prompt_with_no_table() {
        let backend = LocalFileBackend::new("local".into(), config());
        let out = backend
            .generate(
                GenerateRequest {
                    prompt: "hi".into(),
                    max_tokens: 16,
                    temperature: 0.0,
                    stream: false,
                    extra: serde_json::Value::Null,
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out, "[local-small] hi");
    }

    #[tokio::test]
    async fn embeddings_are_stable_across_calls() {
        let backend = LocalFileBackend::new("local".into(), config());
        let a = backend
            .embed(vec!["hello".into()], CancellationToken::new())
            .await
            .unwrap();
        let b = backend
            .embed(vec!["hello".into()], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}
