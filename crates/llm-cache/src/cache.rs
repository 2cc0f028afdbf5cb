//! Single-node cache (C5): `Get`/`Set`/`Delete`/`Flush` over one
//! [`CacheStore`]. A miss is never an error; a failed `Set` is logged and
//! ignored, since the cache is a hint, never a source of truth.

use crate::store::{CacheStore, InMemoryStore};
use std::sync::Arc;
use std::time::Duration;

pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(key, "cache get failed, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        if self.store.set(key, value, ttl).await.is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!(key, "cache set failed, ignoring");
        }
    }

    pub async fn delete(&self, key: &str) {
        let _ = self.store.delete(key).await;
    }

    pub async fn flush(&self) {
        let _ = self.store.flush().await;
    }
}
