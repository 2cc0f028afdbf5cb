//! The backend registry (C2): a mapping from backend id to adapter
//! instance, plus a single designated default. Populated once at startup
//! from configuration; hot reload is out of scope.

mod error;

pub use error::RegistryError;

use llm_backend::{build_adapter, Backend, BackendConfig, BackendDescriptor, BackendKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Holds constructed adapters keyed by backend id and tracks the current
/// default. Registration is atomic: either the config validates and the
/// adapter is constructed and inserted, or nothing changes.
pub struct Registry {
    backends: HashMap<String, RegisteredBackend>,
    default_id: Option<String>,
}

struct RegisteredBackend {
    adapter: Arc<dyn Backend>,
    kind: BackendKind,
    model_name: String,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_id: None,
        }
    }

    /// Constructs the adapter for `config` (kind tag selects the
    /// constructor), validates required config fields, and atomically
    /// inserts it under `id`. If `is_default` is set, `id` becomes the
    /// new default backend.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        config: BackendConfig,
        is_default: bool,
    ) -> Result<(), RegistryError> {
        let id = id.into();
        let adapter = build_adapter(id.clone(), config.clone())
            .map_err(RegistryError::InvalidConfig)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(backend = %id, kind = ?config.kind, is_default, "registered backend");

        self.backends.insert(
            id.clone(),
            RegisteredBackend {
                adapter,
                kind: config.kind,
                model_name: config.model_name,
            },
        );
        if is_default || self.default_id.is_none() {
            self.default_id = Some(id);
        }
        Ok(())
    }

    /// Inserts an already-constructed adapter directly, bypassing
    /// `build_adapter`/`BackendConfig`. For callers who already hold a
    /// `Backend` (custom adapters, test doubles) rather than a config
    /// one of the built-in `BackendKind`s can build.
    pub fn register_adapter(
        &mut self,
        id: impl Into<String>,
        adapter: Arc<dyn Backend>,
        kind: BackendKind,
        model_name: impl Into<String>,
        is_default: bool,
    ) {
        let id = id.into();
        self.backends.insert(
            id.clone(),
            RegisteredBackend {
                adapter,
                kind,
                model_name: model_name.into(),
            },
        );
        if is_default || self.default_id.is_none() {
            self.default_id = Some(id);
        }
    }

    /// Returns the named adapter, or the default if `id` is `None`. Fails
    /// with [`RegistryError::NoSuchBackend`] if neither is resolvable.
    pub fn get(&self, id: Option<&str>) -> Result<Arc<dyn Backend>, RegistryError> {
        let resolved = match id {
            Some(id) => id,
            None => self
                .default_id
                .as_deref()
                .ok_or(RegistryError::NoSuchBackend("<default>".into()))?,
        };
        self.backends
            .get(resolved)
            .map(|b| Arc::clone(&b.adapter))
            .ok_or_else(|| RegistryError::NoSuchBackend(resolved.to_string()))
    }

    /// Read-only metadata for every registered backend, including which id
    /// is the current default.
    pub fn list(&self) -> Vec<BackendDescriptor> {
        self.backends
            .iter()
            .map(|(id, b)| BackendDescriptor {
                id: id.clone(),
                kind: b.kind,
                model_name: b.model_name.clone(),
                is_default: self.default_id.as_deref() == Some(id.as_str()),
            })
            .collect()
    }

    /// All registered backend ids, in no particular guaranteed order
    /// (`HashMap` iteration order), used by the selector when probing
    /// availability across every backend.
    pub fn ids(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    pub fn default_id(&self) -> Option<&str> {
        self.default_id.as_deref()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.backends.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn chat_config(endpoint: &str) -> BackendConfig {
        BackendConfig {
            kind: BackendKind::RemoteHttpChat,
            endpoint: endpoint.into(),
            api_key: Some("k".into()),
            model_name: "gpt-test".into(),
            embedding_model: None,
            default_max_tokens: 512,
            default_temperature: 0.7,
            request_timeout: Duration::from_secs(30),
            local_path: None,
        }
    }

    #[test]
    fn first_registered_backend_becomes_default() {
        let mut registry = Registry::new();
        registry
            .register("b1", chat_config("http://a"), false)
            .unwrap();
        assert_eq!(registry.default_id(), Some("b1"));
    }

    #[test]
    fn explicit_default_overrides_first_registered() {
        let mut registry = Registry::new();
        registry
            .register("b1", chat_config("http://a"), false)
            .unwrap();
        registry
            .register("b2", chat_config("http://b"), true)
            .unwrap();
        assert_eq!(registry.default_id(), Some("b2"));
    }

    #[test]
    fn get_missing_backend_fails() {
        let registry = Registry::new();
        let err = registry.get(Some("nope")).unwrap_err();
        assert!(matches!(err, RegistryError::NoSuchBackend(_)));
    }

    #[test]
    fn get_none_resolves_default() {
        let mut registry = Registry::new();
        registry
            .register("b1", chat_config("http://a"), true)
            .unwrap();
        let adapter = registry.get(None).unwrap();
        assert_eq!(adapter.id(), "b1");
    }

    #[test]
    fn invalid_config_is_rejected_without_mutating_state() {
        let mut registry = Registry::new();
        let mut bad = chat_config("");
        bad.endpoint = String::new();
        assert!(registry.register("bad", bad, false).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn list_reports_current_default() {
        let mut registry = Registry::new();
        registry
            .register("b1", chat_config("http://a"), false)
            .unwrap();
        registry
            .register("b2", chat_config("http://b"), true)
            .unwrap();
        let descriptors = registry.list();
        let default_count = descriptors.iter().filter(|d| d.is_default).count();
        assert_eq!(default_count, 1);
        assert!(descriptors
            .iter()
            .find(|d| d.id == "b2")
            .map(|d| d.is_default)
            .unwrap_or(false));
    }
}
