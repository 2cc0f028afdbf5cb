//! The smart dispatcher (C8): the orchestration surface that ties
//! together the backend registry (C2), model selector (C6), priority
//! queue (C7), response cache (C5), metrics recorder (C3) and rate
//! limiter (C4) into `SmartGenerate`/`SmartEmbed`.

mod cache_key;
mod config;
mod dispatcher;
mod error;
mod streaming;
mod types;

pub use config::{DispatcherConfig, DispatcherConfigBuilder};
pub use dispatcher::{route_generate, Dispatcher};
pub use error::DispatchError;
pub use streaming::MeteredGenerateStream;
pub use types::{EmbedInput, EmbedOutcome, GenerateOutcome, SmartEmbedRequest, SmartGenerateRequest};
