use std::fmt;

/// Errors raised by the model selector. `SelectBackend` only fails when
/// the registry has nothing registered at all — every other situation
/// (no backend currently available, unknown preferred id) falls back to
/// the registry's default per the component's fail-open posture.
#[derive(Debug, Clone)]
pub enum SelectorError {
    NoBackendsRegistered,
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::NoBackendsRegistered => write!(f, "no backends registered"),
        }
    }
}

impl std::error::Error for SelectorError {}
