//! Observational progress records
//!
//! Progress is stored next to the snapshots so any process sharing the
//! store can report it. It never drives control flow.

use crate::error::MirrorResult;
use crate::resource::ResourceDescriptor;
use crate::store::{get_json, set_json, KvStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Lifecycle of a resource's scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Idle,
    Fetching,
    Paused,
    Complete,
    Error,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Paused => "paused",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        write!(f, "{}", label)
    }
}

/// Progress of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceProgress {
    pub resource: String,
    pub status: ProgressStatus,
    /// 0-100, only 100 once complete
    pub percent: u8,
    pub count: usize,
    #[serde(default)]
    pub pages: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceProgress {
    /// Idle progress for a resource that was never scanned
    pub fn idle(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            status: ProgressStatus::Idle,
            percent: 0,
            count: 0,
            pages: 0,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Mark a scan as fetching with `count` records so far
    pub fn fetching(&mut self, count: usize, percent: u8) {
        self.status = ProgressStatus::Fetching;
        self.count = count;
        self.percent = percent.min(99);
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn paused(&mut self) {
        self.status = ProgressStatus::Paused;
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, count: usize) {
        self.status = ProgressStatus::Complete;
        self.count = count;
        self.percent = 100;
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn failed(&mut self, error: impl Into<String>) {
        self.status = ProgressStatus::Error;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }
}

/// Persists progress records in the store
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn load(&self, resource: &ResourceDescriptor) -> MirrorResult<Option<ResourceProgress>> {
        get_json(&*self.store, &resource.keys().progress()).await
    }

    pub async fn save(&self, resource: &ResourceDescriptor, progress: &ResourceProgress) -> MirrorResult<()> {
        set_json(&*self.store, &resource.keys().progress(), progress, self.ttl).await
    }

    pub async fn clear(&self, resource: &ResourceDescriptor) -> MirrorResult<()> {
        self.store.delete(&resource.keys().progress()).await
    }

    /// Stored progress, or idle when absent or unreadable
    pub async fn snapshot(&self, resource: &ResourceDescriptor) -> ResourceProgress {
        match self.load(resource).await {
            Ok(Some(progress)) => progress,
            Ok(None) => ResourceProgress::idle(&resource.name),
            Err(e) => {
                warn!("Failed to read progress of {}: {}", resource.name, e);
                ResourceProgress::idle(&resource.name)
            }
        }
    }
}
