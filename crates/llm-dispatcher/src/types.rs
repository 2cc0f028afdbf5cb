//! Request/response shapes for the dispatcher's public operations.

use std::time::Duration;

/// Either a single string or a batch, mirroring `Embed(text | list<text>)`.
#[derive(Debug, Clone)]
pub enum EmbedInput {
    Single(String),
    Many(Vec<String>),
}

impl EmbedInput {
    pub(crate) fn as_texts(&self) -> Vec<String> {
        match self {
            EmbedInput::Single(s) => vec![s.clone()],
            EmbedInput::Many(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmartGenerateRequest {
    pub prompt: String,
    pub preferred_backend: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub use_cache: bool,
    pub caller_id: Option<String>,
    pub priority: u8,
    pub timeout: Option<Duration>,
    pub extra: serde_json::Value,
}

impl Default for SmartGenerateRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            preferred_backend: None,
            max_tokens: 256,
            temperature: 0.7,
            use_cache: true,
            caller_id: None,
            priority: 5,
            timeout: None,
            extra: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub text: String,
    pub model_used: String,
    pub processing_time: Duration,
    pub token_estimate: u32,
    pub cached: bool,
}

#[derive(Debug, Clone)]
pub struct SmartEmbedRequest {
    pub input: EmbedInput,
    pub preferred_backend: Option<String>,
    pub use_cache: bool,
    pub caller_id: Option<String>,
    pub priority: u8,
    pub timeout: Option<Duration>,
}

impl Default for SmartEmbedRequest {
    fn default() -> Self {
        Self {
            input: EmbedInput::Single(String::new()),
            preferred_backend: None,
            use_cache: true,
            caller_id: None,
            priority: 5,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    pub embeddings: Vec<Vec<f32>>,
    pub model_used: String,
    pub processing_time: Duration,
    pub dimensions: usize,
    pub cached: bool,
}

/// The subset of a cached generation result serialized into the cache
/// store; re-hydrated verbatim on a hit rather than re-estimating tokens.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct CachedGenerate {
    pub text: String,
    pub model_used: String,
    pub token_estimate: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct CachedEmbed {
    pub embeddings: Vec<Vec<f32>>,
    pub model_used: String,
}

/// `max(1, ceil(word_count * 1.3))`, the estimator §4.8 specifies in
/// place of an actual provider-reported token count.
pub(crate) fn estimate_tokens(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    ((words as f32 * 1.3).ceil() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_is_never_zero() {
        assert_eq!(estimate_tokens(""), 1);
    }

    #[test]
    fn token_estimate_scales_with_word_count() {
        assert_eq!(estimate_tokens("one two three four five"), 7);
    }
}
