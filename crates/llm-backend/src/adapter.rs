//! The uniform adapter contract (C1) all backend kinds implement.

use crate::error::BackendError;
use crate::stream::TextChunkStream;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A single generation request. `stream` selects between the buffered and
/// streaming `generate` paths; adapters that can't stream still accept the
/// flag and simply ignore it, buffering the whole response.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    pub extra: serde_json::Value,
}

/// Uniform interface to one remote or local LLM provider.
///
/// All operations are cancellable via a caller-provided [`CancellationToken`]
/// and must honor the request timeout baked into the adapter at
/// construction time; there is no variant of either method that blocks
/// indefinitely.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable identifier this adapter was registered under.
    fn id(&self) -> &str;

    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<String, BackendError>;

    /// Streaming variant; callers that want a one-shot string should prefer
    /// `generate` with `stream: false`. Implementations that have no native
    /// streaming protocol may return a single-chunk stream.
    async fn generate_stream(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<TextChunkStream, BackendError>;

    async fn embed(
        &self,
        texts: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<Vec<Vec<f32>>, BackendError>;
}
