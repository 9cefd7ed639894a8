//! Three-tier read policy
//!
//! Reads never wait on a running scan. A complete snapshot is served as is;
//! a partial snapshot is served while the scan is continued in the
//! background; a full miss scans inline only if the lock is free.

use super::entry::{CacheEntry, SnapshotStore};
use crate::engine::{quiet, BackgroundPool, FetchEngine};
use crate::error::MirrorResult;
use crate::resource::ResourceDescriptor;
use crate::source::Record;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the records of a read came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Complete snapshot
    Complete,
    /// Partial snapshot of an unfinished scan
    Partial,
    /// Scan run inline by this read
    Inline,
    /// Nothing cached yet; a scan was scheduled
    Pending,
}

impl fmt::Display for ReadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Partial => write!(f, "partial"),
            Self::Inline => write!(f, "inline"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

/// Records returned by a read
///
/// An empty, incomplete outcome means "retry shortly", not "no records".
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub records: Vec<Record>,
    pub is_complete: bool,
    pub source: ReadSource,
}

impl ReadOutcome {
    fn from_entry(entry: CacheEntry, source: ReadSource) -> Self {
        Self {
            is_complete: source == ReadSource::Complete,
            records: entry.records,
            source,
        }
    }

    fn pending() -> Self {
        Self {
            records: Vec::new(),
            is_complete: false,
            source: ReadSource::Pending,
        }
    }
}

pub struct CacheStateManager {
    engine: Arc<FetchEngine>,
    pool: Arc<BackgroundPool>,
}

impl CacheStateManager {
    pub fn new(engine: Arc<FetchEngine>, pool: Arc<BackgroundPool>) -> Self {
        Self { engine, pool }
    }

    fn snapshots(&self) -> &SnapshotStore {
        self.engine.snapshots()
    }

    /// Read the best available records of `resource`
    pub async fn read(&self, resource: &ResourceDescriptor) -> ReadOutcome {
        match self.read_cached(resource).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => self.read_miss(resource).await,
            Err(e) => {
                warn!("Cache read of {} failed, serving empty: {}", resource.name, e);
                ReadOutcome::pending()
            }
        }
    }

    async fn read_cached(&self, resource: &ResourceDescriptor) -> MirrorResult<Option<ReadOutcome>> {
        if let Some(entry) = self.snapshots().load_complete(resource).await? {
            debug!("Serving complete snapshot of {}", resource.name);
            return Ok(Some(ReadOutcome::from_entry(entry, ReadSource::Complete)));
        }

        if let Some(entry) = self.snapshots().load_partial(resource).await? {
            debug!(
                "Serving partial snapshot of {} ({} records)",
                resource.name, entry.count
            );
            self.continue_in_background(resource).await;
            return Ok(Some(ReadOutcome::from_entry(entry, ReadSource::Partial)));
        }

        Ok(None)
    }

    async fn read_miss(&self, resource: &ResourceDescriptor) -> ReadOutcome {
        let settings = self.engine.settings();
        let acquired = self
            .engine
            .lock()
            .acquire(resource, settings.read_lock_retries, settings.lock_retry_delay)
            .await;

        if !acquired {
            info!("Scan of {} running elsewhere, serving empty", resource.name);
            self.schedule_scan(resource);
            return ReadOutcome::pending();
        }

        // A scan may have completed between the miss and the acquisition
        match self.snapshots().load_complete(resource).await {
            Ok(Some(entry)) => {
                self.engine.lock().release(resource).await;
                return ReadOutcome::from_entry(entry, ReadSource::Complete);
            }
            Ok(None) => {}
            Err(e) => debug!("Re-check of {} failed: {}", resource.name, e),
        }

        let outcome = self.engine.run_acquired(resource, &quiet).await;
        ReadOutcome {
            is_complete: outcome.is_complete(),
            records: outcome.records,
            source: ReadSource::Inline,
        }
    }

    /// Continue a partial scan if nobody else is
    async fn continue_in_background(&self, resource: &ResourceDescriptor) {
        if !self.engine.lock().try_acquire(resource).await {
            debug!("Scan of {} already progressing elsewhere", resource.name);
            return;
        }

        let engine = self.engine.clone();
        let owned = resource.clone();
        let submitted = self.pool.submit(format!("continue {}", resource.name), async move {
            engine
                .run_acquired(&owned, &quiet)
                .await
                .into_result()
                .map(|_| ())
        });

        if !submitted {
            self.engine.lock().release(resource).await;
        }
    }

    /// Submit a scan that waits for the lock like an orchestrator run
    fn schedule_scan(&self, resource: &ResourceDescriptor) {
        let engine = self.engine.clone();
        let owned = resource.clone();
        self.pool.submit(format!("fetch {}", resource.name), async move {
            engine.run(&owned, &quiet).await.into_result().map(|_| ())
        });
    }
}
