//! Process-local store

use super::KvStore;
use crate::error::{MirrorError, MirrorResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

struct StoredValue {
    value: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory store with per-key expiry
///
/// Expiry uses tokio's clock, so tests running with a paused clock can
/// advance past a ttl.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MirrorResult<MutexGuard<'_, HashMap<String, StoredValue>>> {
        self.entries
            .lock()
            .map_err(|_| MirrorError::Internal("memory store mutex poisoned".to_string()))
    }

    /// Remaining lifetime of a live key
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries().ok()?;
        let now = Instant::now();
        entries
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| v.expires_at - now)
    }

    /// Whether a live value exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.ttl(key).is_some()
    }

    /// Live keys starting with `prefix`, sorted
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let Ok(entries) = self.entries() else {
            return vec![];
        };
        let now = Instant::now();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, v)| k.starts_with(prefix) && v.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> MirrorResult<Option<Vec<u8>>> {
        let mut entries = self.entries()?;
        let now = Instant::now();
        match entries.get(key) {
            Some(v) if v.is_live(now) => Ok(Some(v.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> MirrorResult<()> {
        let mut entries = self.entries()?;
        entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> MirrorResult<bool> {
        let mut entries = self.entries()?;
        let now = Instant::now();
        if entries.get(key).is_some_and(|v| v.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_vec(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> MirrorResult<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
