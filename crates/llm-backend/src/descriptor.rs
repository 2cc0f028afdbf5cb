//! Backend descriptors and characteristic vectors.

use serde::Serialize;
use std::time::Duration;

/// Discriminates which adapter constructor a [`BackendConfig`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Weights or a static response table loaded from local disk.
    LocalFile,
    /// Chat-completions style remote HTTP provider.
    RemoteHttpChat,
    /// Legacy completions style remote HTTP provider.
    RemoteHttpCompletion,
    /// Internal gateway that itself multiplexes to concrete providers.
    RemoteHttpProxy,
}

/// Provider-specific configuration captured at registration time.
///
/// Immutable after registration; the registry never mutates a config in
/// place, it only ever replaces the whole descriptor.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model_name: String,
    pub embedding_model: Option<String>,
    pub default_max_tokens: u32,
    pub default_temperature: f32,
    pub request_timeout: Duration,
    /// Path to weights/response table; only meaningful for `LocalFile`.
    pub local_path: Option<String>,
}

impl BackendConfig {
    /// Required-field validation performed by the registry before a backend
    /// is admitted. Credentials are optional (local adapters don't need
    /// them); endpoint and model name are not.
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            BackendKind::LocalFile => {
                if self.local_path.is_none() {
                    return Err("local-file backend requires local_path".into());
                }
            }
            _ => {
                if self.endpoint.is_empty() {
                    return Err("remote backend requires a non-empty endpoint".into());
                }
            }
        }
        if self.model_name.is_empty() {
            return Err("model_name is required".into());
        }
        Ok(())
    }
}

/// Ten-axis characteristic vector in `[0, 10]`, seeded per backend kind and
/// intended to be refreshed from observed metrics (currently static, per
/// the component design).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Characteristics {
    pub creativity: f64,
    pub factual_accuracy: f64,
    pub code_quality: f64,
    pub reasoning: f64,
    pub computation: f64,
    pub conciseness: f64,
    pub language_quality: f64,
    pub cost_efficiency: f64,
    pub speed: f64,
    pub context_length: f64,
}

impl Characteristics {
    /// Balanced defaults; callers seed backend-specific values at
    /// registration when they have better numbers.
    pub fn balanced() -> Self {
        Self {
            creativity: 5.0,
            factual_accuracy: 5.0,
            code_quality: 5.0,
            reasoning: 5.0,
            computation: 5.0,
            conciseness: 5.0,
            language_quality: 5.0,
            cost_efficiency: 5.0,
            speed: 5.0,
            context_length: 5.0,
        }
    }

    /// Applies a per-axis weight vector and folds the ten axes down into
    /// one weighted-average score, as used by the selector's scoring rule.
    pub fn weighted_average(&self, weights: &Weights) -> f64 {
        let pairs = [
            (self.creativity, weights.creativity),
            (self.factual_accuracy, weights.factual_accuracy),
            (self.code_quality, weights.code_quality),
            (self.reasoning, weights.reasoning),
            (self.computation, weights.computation),
            (self.conciseness, weights.conciseness),
            (self.language_quality, weights.language_quality),
            (self.cost_efficiency, weights.cost_efficiency),
            (self.speed, weights.speed),
            (self.context_length, weights.context_length),
        ];
        let weighted: f64 = pairs.iter().map(|(c, w)| c * w).sum();
        let total_weight: f64 = pairs.iter().map(|(_, w)| w).sum();
        if total_weight <= 0.0 {
            0.0
        } else {
            weighted / total_weight
        }
    }
}

/// Per-axis weight vector in `[0.5, 2.5]`, derived from a query fingerprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub creativity: f64,
    pub factual_accuracy: f64,
    pub code_quality: f64,
    pub reasoning: f64,
    pub computation: f64,
    pub conciseness: f64,
    pub language_quality: f64,
    pub cost_efficiency: f64,
    pub speed: f64,
    pub context_length: f64,
}

impl Weights {
    pub fn neutral() -> Self {
        Self {
            creativity: 1.0,
            factual_accuracy: 1.0,
            code_quality: 1.0,
            reasoning: 1.0,
            computation: 1.0,
            conciseness: 1.0,
            language_quality: 1.0,
            cost_efficiency: 1.0,
            speed: 1.0,
            context_length: 1.0,
        }
    }
}

/// Read-only registration metadata returned by `Registry::list`.
#[derive(Debug, Clone, Serialize)]
pub struct BackendDescriptor {
    pub id: String,
    pub kind: BackendKind,
    pub model_name: String,
    pub is_default: bool,
}
