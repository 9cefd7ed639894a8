//! Key-value store abstraction
//!
//! The store is the only shared mutable resource: cached snapshots, scan
//! positions, chunks, progress, pause flags and locks all live here.
//! Backends:
//! - memory: process-local, used by tests and single-process embedding
//! - file: one file per key, shared by processes on the same host
//! - redis: shared by every process that can reach the server

mod file;
mod memory;
mod redis_backend;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use redis_backend::RedisStore;

use crate::config::{Config, ConfigManager, StoreBackend};
use crate::error::{MirrorError, MirrorResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Abstract key-value store interface
///
/// Every value carries an expiry. `set_if_absent` must be atomic across
/// all processes sharing the store; the distributed lock depends on it.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a live value
    async fn get(&self, key: &str) -> MirrorResult<Option<Vec<u8>>>;

    /// Write a value, replacing any existing one
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> MirrorResult<()>;

    /// Write a value only if no live value exists; returns whether it was written
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> MirrorResult<bool>;

    /// Remove a value (absent keys are not an error)
    async fn delete(&self, key: &str) -> MirrorResult<()>;

    /// Get the human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}

/// Create the store selected by the configuration
pub async fn create_store(config: &Config) -> MirrorResult<Arc<dyn KvStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::File => {
            let dir = config
                .store
                .path
                .clone()
                .unwrap_or_else(ConfigManager::store_dir);
            Ok(Arc::new(FileStore::open(dir).await?))
        }
        StoreBackend::Redis => {
            let url = config.store.url.as_deref().ok_or_else(|| {
                MirrorError::MissingCredentials("redis store (store.url)".to_string())
            })?;
            Ok(Arc::new(RedisStore::connect(url).await?))
        }
    }
}

/// Read and decode a JSON value
///
/// Undecodable values are reported as absent: a corrupted entry must
/// degrade to a re-fetch, never to a failed read.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> MirrorResult<Option<T>> {
    let Some(bytes) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Ignoring undecodable value at {}: {}", key, e);
            Ok(None)
        }
    }
}

/// Encode and write a JSON value
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> MirrorResult<()> {
    let bytes = serde_json::to_vec(value)?;
    debug!("Writing {} bytes to {}", bytes.len(), key);
    store.set(key, &bytes, ttl).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn json_helpers_roundtrip() {
        let store = MemoryStore::new();
        set_json(&store, "k", &json!({"a": 1}), Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<serde_json::Value> = get_json(&store, "k").await.unwrap();
        assert_eq!(value, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn get_json_treats_garbage_as_absent() {
        let store = MemoryStore::new();
        store
            .set("k", b"{not json", Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<serde_json::Value> = get_json(&store, "k").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn create_store_memory_backend() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        let store = create_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn create_store_file_backend_uses_configured_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.path = Some(temp.path().join("kv"));
        let store = create_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "file");
        assert!(temp.path().join("kv").is_dir());
    }
}
