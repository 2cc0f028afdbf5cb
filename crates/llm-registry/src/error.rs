use std::fmt;

/// Errors raised by the backend registry.
#[derive(Debug, Clone)]
pub enum RegistryError {
    /// Neither the requested id nor a default backend could be resolved.
    NoSuchBackend(String),
    /// `BackendConfig::validate` rejected the config at registration time.
    InvalidConfig(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NoSuchBackend(id) => write!(f, "no such backend: {id}"),
            RegistryError::InvalidConfig(msg) => write!(f, "invalid backend config: {msg}"),
        }
    }
}

impl std::error::Error for RegistryError {}
