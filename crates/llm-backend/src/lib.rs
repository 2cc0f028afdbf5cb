//! The backend adapter contract (C1): a uniform `generate`/`embed` surface
//! over heterogeneous remote LLM providers, plus the descriptor types the
//! registry (C2) and selector (C6) build on.
//!
//! Each [`BackendKind`] gets its own adapter struct implementing [`Backend`];
//! callers construct one via [`build_adapter`] from a [`BackendConfig`]
//! rather than naming the concrete struct, mirroring the kind-discriminated
//! construction the registry performs at startup.

pub mod adapter;
pub mod descriptor;
pub mod error;
pub mod http_chat;
pub mod http_completion;
pub mod http_proxy;
pub mod local_file;
pub mod stream;

pub use adapter::{Backend, GenerateRequest};
pub use descriptor::{BackendConfig, BackendDescriptor, BackendKind, Characteristics, Weights};
pub use error::BackendError;
pub use stream::TextChunkStream;

use std::sync::Arc;

/// Constructs the adapter implementation selected by `config.kind`,
/// validating the config first. This is the one place in the crate that
/// maps a [`BackendKind`] tag to a concrete struct.
pub fn build_adapter(id: impl Into<String>, config: BackendConfig) -> Result<Arc<dyn Backend>, String> {
    config.validate()?;
    let id = id.into();
    let adapter: Arc<dyn Backend> = match config.kind {
        BackendKind::RemoteHttpChat => Arc::new(http_chat::HttpChatBackend::new(id, config)),
        BackendKind::RemoteHttpCompletion => {
            Arc::new(http_completion::HttpCompletionBackend::new(id, config))
        }
        BackendKind::RemoteHttpProxy => Arc::new(http_proxy::HttpProxyBackend::new(id, config)),
        BackendKind::LocalFile => Arc::new(local_file::LocalFileBackend::new(id, config)),
    };
    Ok(adapter)
}
