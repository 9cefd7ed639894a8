//! Snapshot entries and their persistence
//!
//! A snapshot is the materialized record list of one resource. The partial
//! snapshot also embeds the token of the page after its last record, so a
//! crash between writing it and writing the scan position still resumes
//! exactly where the records end.

use crate::error::MirrorResult;
use crate::resource::ResourceDescriptor;
use crate::source::{Record, ScanToken};
use crate::store::{get_json, set_json, KvStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// No snapshot exists
    Absent,
    /// A scan is underway or was interrupted
    Partial,
    /// The scan reached the end of the table
    Complete,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Partial => write!(f, "partial"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Stored snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub state: CacheState,
    pub count: usize,
    pub written_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Token of the page after the last record (partial snapshots only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<ScanToken>,
    pub records: Vec<Record>,
}

impl CacheEntry {
    /// Whether the entry outlived its own expiry stamp
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Borrowed form of `CacheEntry` so pages are not cloned on every write
#[derive(Serialize)]
struct EntryRef<'a> {
    state: CacheState,
    count: usize,
    written_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a ScanToken>,
    records: &'a [Record],
}

impl<'a> EntryRef<'a> {
    fn new(
        state: CacheState,
        records: &'a [Record],
        next_token: Option<&'a ScanToken>,
        ttl: Duration,
    ) -> Self {
        let written_at = Utc::now();
        let expires_at = ChronoDuration::from_std(ttl)
            .ok()
            .and_then(|lifetime| written_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            state,
            count: records.len(),
            written_at,
            expires_at,
            next_token,
            records,
        }
    }
}

/// Reads and writes the snapshots and scan position of resources
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn KvStore>,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// The complete snapshot, if present and live
    pub async fn load_complete(&self, resource: &ResourceDescriptor) -> MirrorResult<Option<CacheEntry>> {
        self.load(&resource.keys().complete(), CacheState::Complete)
            .await
    }

    /// The partial snapshot, if present and live
    pub async fn load_partial(&self, resource: &ResourceDescriptor) -> MirrorResult<Option<CacheEntry>> {
        self.load(&resource.keys().partial(), CacheState::Partial)
            .await
    }

    async fn load(&self, key: &str, expected: CacheState) -> MirrorResult<Option<CacheEntry>> {
        let Some(entry) = get_json::<CacheEntry>(&*self.store, key).await? else {
            return Ok(None);
        };

        if entry.state != expected {
            debug!("Ignoring {} entry stored at {}", entry.state, key);
            return Ok(None);
        }
        if entry.is_expired() {
            debug!("Snapshot at {} expired", key);
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Replace the partial snapshot
    pub async fn save_partial(
        &self,
        resource: &ResourceDescriptor,
        records: &[Record],
        next_token: Option<&ScanToken>,
    ) -> MirrorResult<()> {
        let entry = EntryRef::new(CacheState::Partial, records, next_token, resource.partial_ttl);
        set_json(&*self.store, &resource.keys().partial(), &entry, resource.partial_ttl).await
    }

    /// Write the complete snapshot
    pub async fn save_complete(&self, resource: &ResourceDescriptor, records: &[Record]) -> MirrorResult<()> {
        let entry = EntryRef::new(CacheState::Complete, records, None, resource.ttl);
        set_json(&*self.store, &resource.keys().complete(), &entry, resource.ttl).await
    }

    /// Token of the next unscanned page, if a scan is resumable
    pub async fn load_position(&self, resource: &ResourceDescriptor) -> MirrorResult<Option<ScanToken>> {
        get_json(&*self.store, &resource.keys().position()).await
    }

    pub async fn save_position(&self, resource: &ResourceDescriptor, token: &ScanToken) -> MirrorResult<()> {
        set_json(&*self.store, &resource.keys().position(), token, resource.partial_ttl).await
    }

    pub async fn clear_position(&self, resource: &ResourceDescriptor) -> MirrorResult<()> {
        self.store.delete(&resource.keys().position()).await
    }

    pub async fn clear_partial(&self, resource: &ResourceDescriptor) -> MirrorResult<()> {
        self.store.delete(&resource.keys().partial()).await
    }

    pub async fn clear_complete(&self, resource: &ResourceDescriptor) -> MirrorResult<()> {
        self.store.delete(&resource.keys().complete()).await
    }

    /// Which snapshot currently serves reads
    pub async fn state(&self, resource: &ResourceDescriptor) -> MirrorResult<CacheState> {
        if self.load_complete(resource).await?.is_some() {
            return Ok(CacheState::Complete);
        }
        if self.load_partial(resource).await?.is_some() {
            return Ok(CacheState::Partial);
        }
        Ok(CacheState::Absent)
    }
}
