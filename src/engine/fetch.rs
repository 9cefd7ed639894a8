//! Resumable fetch engine
//!
//! Runs one scan of one resource under its lock. After every page the
//! accumulated records are persisted as the partial snapshot, then the
//! token of the next page as the scan position, so a scan killed at any
//! point resumes from the last persisted page. Reaching the end of the
//! table writes the complete snapshot, then drops the position and the
//! partial snapshot in that order.

use super::pause::PauseControl;
use super::progress::{ProgressStatus, ProgressTracker, ResourceProgress};
use crate::cache::{ChunkWriter, SnapshotStore};
use crate::config::EngineConfig;
use crate::error::{MirrorError, MirrorResult};
use crate::events::EventLog;
use crate::lock::DistributedLock;
use crate::resource::ResourceDescriptor;
use crate::source::{Record, ScanToken, SourceScanner};
use crate::store::KvStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Receives progress after every state change of a scan
pub type ProgressObserver<'a> = dyn Fn(&ResourceProgress) + Send + Sync + 'a;

/// Observer that ignores progress
pub fn quiet(_: &ResourceProgress) {}

/// Engine tuning resolved from `[engine]`
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub lock_ttl: Duration,
    pub lock_retries: u32,
    pub lock_retry_delay: Duration,
    pub read_lock_retries: u32,
    pub page_delay: Duration,
    pub progress_ttl: Duration,
    pub background_workers: usize,
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            lock_ttl: Duration::from_secs(config.lock_ttl_secs),
            lock_retries: config.lock_retries,
            lock_retry_delay: Duration::from_millis(config.lock_retry_delay_ms),
            read_lock_retries: config.read_lock_retries,
            page_delay: Duration::from_millis(config.page_delay_ms),
            progress_ttl: Duration::from_secs(config.progress_ttl_secs),
            background_workers: config.background_workers,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Result of one scan invocation
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub resource: String,
    pub status: ProgressStatus,
    /// Every record known after this invocation, resumed ones included
    pub records: Vec<Record>,
    pub pages: u64,
    pub error: Option<String>,
    /// The lock was held elsewhere and nothing was scanned
    pub skipped: bool,
}

impl FetchOutcome {
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_complete(&self) -> bool {
        self.status == ProgressStatus::Complete
    }

    /// The failure of this scan, if any
    pub fn into_result(self) -> MirrorResult<Self> {
        match self.error.clone() {
            Some(reason) => Err(MirrorError::FetchFailed {
                resource: self.resource,
                reason,
            }),
            None => Ok(self),
        }
    }
}

enum ScanEnd {
    Complete,
    Paused,
}

/// Drives scans of resources against a store and a scanner
pub struct FetchEngine {
    store: Arc<dyn KvStore>,
    scanner: Arc<dyn SourceScanner>,
    lock: DistributedLock,
    snapshots: SnapshotStore,
    progress: ProgressTracker,
    pause: PauseControl,
    settings: EngineSettings,
}

impl FetchEngine {
    pub fn new(
        store: Arc<dyn KvStore>,
        scanner: Arc<dyn SourceScanner>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            lock: DistributedLock::new(store.clone(), settings.lock_ttl),
            snapshots: SnapshotStore::new(store.clone()),
            progress: ProgressTracker::new(store.clone(), settings.progress_ttl),
            pause: PauseControl::new(store.clone()),
            store,
            scanner,
            settings,
        }
    }

    /// Record lock takeovers in `events`
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.lock = self.lock.with_events(events);
        self
    }

    pub fn lock(&self) -> &DistributedLock {
        &self.lock
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn pause_control(&self) -> &PauseControl {
        &self.pause
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Acquire the lock and scan `resource`
    ///
    /// Skips without touching the resource when another runner holds the
    /// lock after the configured retries.
    pub async fn run(
        &self,
        resource: &ResourceDescriptor,
        observer: &ProgressObserver<'_>,
    ) -> FetchOutcome {
        let acquired = self
            .lock
            .acquire(
                resource,
                self.settings.lock_retries,
                self.settings.lock_retry_delay,
            )
            .await;

        if !acquired {
            info!("Skipping {}: scan already running elsewhere", resource.name);
            let progress = self.progress.snapshot(resource).await;
            return FetchOutcome {
                resource: resource.name.clone(),
                status: progress.status,
                records: Vec::new(),
                pages: 0,
                error: None,
                skipped: true,
            };
        }

        self.run_acquired(resource, observer).await
    }

    /// Scan `resource` with its lock already held, releasing it afterwards
    ///
    /// The lock is released only if this runner still owns it; after a
    /// mid-scan takeover the record belongs to the new holder.
    pub async fn run_acquired(
        &self,
        resource: &ResourceDescriptor,
        observer: &ProgressObserver<'_>,
    ) -> FetchOutcome {
        let outcome = self.scan(resource, observer).await;
        self.lock.release_if_owner(resource).await;
        outcome
    }

    async fn scan(&self, resource: &ResourceDescriptor, observer: &ProgressObserver<'_>) -> FetchOutcome {
        let mut progress = ResourceProgress::idle(&resource.name);
        let mut records = Vec::new();

        let end = self
            .drive(resource, observer, &mut progress, &mut records)
            .await;

        let (status, error) = match end {
            Ok(ScanEnd::Complete) => (ProgressStatus::Complete, None),
            Ok(ScanEnd::Paused) => (ProgressStatus::Paused, None),
            Err(e) => {
                if e.is_retryable() && !e.is_connectivity() {
                    warn!("Scan of {} interrupted, resumable: {}", resource.name, e);
                } else {
                    error!("Scan of {} failed: {}", resource.name, e);
                }
                progress.failed(e.to_string());
                self.publish(resource, &progress, observer).await;
                (ProgressStatus::Error, Some(e.to_string()))
            }
        };

        FetchOutcome {
            resource: resource.name.clone(),
            status,
            records,
            pages: progress.pages,
            error,
            skipped: false,
        }
    }

    /// Restore any resumable state, then pump pages
    async fn drive(
        &self,
        resource: &ResourceDescriptor,
        observer: &ProgressObserver<'_>,
        progress: &mut ResourceProgress,
        records: &mut Vec<Record>,
    ) -> MirrorResult<ScanEnd> {
        let mut token = None;

        if let Some(position) = self.snapshots.load_position(resource).await? {
            match self.snapshots.load_partial(resource).await? {
                Some(partial) => {
                    token = Some(partial.next_token.unwrap_or(position));
                    *records = partial.records;
                }
                None => warn!(
                    "Scan position of {} has no partial snapshot, restarting",
                    resource.name
                ),
            }
        }

        let resumed = token.is_some();
        if resumed {
            info!("Resuming {} after {} records", resource.name, records.len());
        } else {
            info!("Starting fresh scan of {}", resource.name);
        }

        let mut chunks = ChunkWriter::start(self.store.clone(), resource, resumed).await?;

        progress.fetching(records.len(), resource.estimate_percent(records.len() as u64));
        self.publish(resource, progress, observer).await;

        let end = self
            .pump(resource, observer, progress, records, token, &mut chunks)
            .await;

        if end.is_err() {
            if let Err(e) = chunks.finish().await {
                warn!("Failed to flush chunks of {}: {}", resource.name, e);
            }
        }
        end
    }

    async fn pump(
        &self,
        resource: &ResourceDescriptor,
        observer: &ProgressObserver<'_>,
        progress: &mut ResourceProgress,
        records: &mut Vec<Record>,
        mut token: Option<ScanToken>,
        chunks: &mut ChunkWriter,
    ) -> MirrorResult<ScanEnd> {
        loop {
            if self.pause.is_paused(resource).await? {
                chunks.finish().await?;
                progress.paused();
                self.publish(resource, progress, observer).await;
                info!("Paused {} at {} records", resource.name, records.len());
                return Ok(ScanEnd::Paused);
            }

            if !self.lock.renew(resource).await {
                return Err(MirrorError::LockLost {
                    resource: resource.name.clone(),
                });
            }

            let page = self
                .scanner
                .scan(&resource.table, resource.page_size, token.as_ref())
                .await?;

            let items: Vec<Record> = page
                .items
                .into_iter()
                .map(|record| resource.map_record(record))
                .collect();
            chunks.append(&items).await?;
            records.extend(items);
            progress.pages += 1;

            debug!(
                "Page {} of {}: {} records total",
                progress.pages,
                resource.name,
                records.len()
            );

            let Some(next) = page.next_token else {
                self.snapshots.save_complete(resource, records).await?;
                self.snapshots.clear_position(resource).await?;
                self.snapshots.clear_partial(resource).await?;
                chunks.finish().await?;

                progress.complete(records.len());
                self.publish(resource, progress, observer).await;
                info!(
                    "Completed {}: {} records in {} pages",
                    resource.name,
                    records.len(),
                    progress.pages
                );
                return Ok(ScanEnd::Complete);
            };

            self.snapshots
                .save_partial(resource, records, Some(&next))
                .await?;
            self.snapshots.save_position(resource, &next).await?;
            token = Some(next);

            progress.fetching(records.len(), resource.estimate_percent(records.len() as u64));
            self.publish(resource, progress, observer).await;

            if !self.settings.page_delay.is_zero() {
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }
    }

    async fn publish(
        &self,
        resource: &ResourceDescriptor,
        progress: &ResourceProgress,
        observer: &ProgressObserver<'_>,
    ) {
        if let Err(e) = self.progress.save(resource, progress).await {
            warn!("Failed to record progress of {}: {}", resource.name, e);
        }
        observer(progress);
    }

    /// Delete every stored trace of `resource` except its lock
    ///
    /// Used for forced refreshes; the next scan starts from scratch.
    pub async fn purge(&self, resource: &ResourceDescriptor) -> MirrorResult<()> {
        self.snapshots.clear_complete(resource).await?;
        self.snapshots.clear_position(resource).await?;
        self.snapshots.clear_partial(resource).await?;
        ChunkWriter::purge(&*self.store, resource).await?;
        self.progress.clear(resource).await?;
        debug!("Purged cached state of {}", resource.name);
        Ok(())
    }
}
