//! Service facade
//!
//! Wires the store, scanner, engine, read policy, orchestrator and
//! background pool together for the configured resources, and exposes the
//! operations callers use: read, invalidate, orchestrate, pause control and
//! status.

pub mod api;

pub use api::{CacheAction, CacheActionRequest, ReadQuery, ReadResponse};

use crate::cache::{CacheState, CacheStateManager, ChunkManifest, ChunkWriter};
use crate::config::Config;
use crate::engine::{
    quiet, BackgroundPool, EngineSettings, FetchEngine, Orchestrator, OrchestratorReport,
    ProgressObserver, ResourceProgress,
};
use crate::error::MirrorResult;
use crate::events::EventLog;
use crate::resource::{ResourceDescriptor, ResourceSet};
use crate::source::{create_scanner, SourceScanner};
use crate::store::{create_store, KvStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stored state of one resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatus {
    pub name: String,
    pub table: String,
    pub priority: u32,
    pub cache: CacheState,
    pub resumable: bool,
    pub paused: bool,
    pub locked: bool,
    pub progress: ResourceProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<ChunkManifest>,
}

pub struct MirrorService {
    resources: ResourceSet,
    engine: Arc<FetchEngine>,
    cache: CacheStateManager,
    orchestrator: Orchestrator,
    pool: Arc<BackgroundPool>,
    events: EventLog,
}

impl MirrorService {
    /// Build the service from configuration, connecting to the backends
    pub async fn from_config(config: &Config) -> MirrorResult<Self> {
        let resources = ResourceSet::from_config(config)?;
        let store = create_store(config).await?;
        let scanner = create_scanner(config)?;
        debug!(
            "Using {} store and {} scanner for {}",
            store.backend_name(),
            scanner.scanner_name(),
            resources.names().join(", ")
        );

        Ok(Self::new(
            resources,
            store,
            scanner,
            EngineSettings::from(&config.engine),
            EventLog::new(config),
        ))
    }

    pub fn new(
        resources: ResourceSet,
        store: Arc<dyn KvStore>,
        scanner: Arc<dyn SourceScanner>,
        settings: EngineSettings,
        events: EventLog,
    ) -> Self {
        let pool = Arc::new(
            BackgroundPool::new(settings.background_workers).with_events(events.clone()),
        );
        let engine =
            Arc::new(FetchEngine::new(store, scanner, settings).with_events(events.clone()));

        Self {
            cache: CacheStateManager::new(engine.clone(), pool.clone()),
            orchestrator: Orchestrator::new(engine.clone()).with_events(events.clone()),
            resources,
            engine,
            pool,
            events,
        }
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    pub fn engine(&self) -> &Arc<FetchEngine> {
        &self.engine
    }

    pub fn pool(&self) -> &Arc<BackgroundPool> {
        &self.pool
    }

    /// Read API
    pub async fn read_page(&self, name: &str, query: &ReadQuery) -> MirrorResult<ReadResponse> {
        let resource = self.resources.get(name)?;

        if query.force_refresh {
            if let Err(e) = self.engine.purge(resource).await {
                warn!("Failed to purge {} before read: {}", name, e);
            }
        }

        if query.force_start {
            let outcome = self.engine.run(resource, &quiet).await;
            debug!("Forced scan of {} ended {}", name, outcome.status);
        }

        let outcome = self.cache.read(resource).await;
        debug!(
            "Read {} records of {} from {}",
            outcome.records.len(),
            name,
            outcome.source
        );
        Ok(ReadResponse::paginate(
            outcome.records,
            outcome.is_complete,
            query,
        ))
    }

    /// Cache Invalidation API: drop the complete snapshot
    ///
    /// The next read falls through to the partial snapshot or a new scan.
    pub async fn invalidate(&self, name: &str) -> MirrorResult<()> {
        let resource = self.resources.get(name)?;
        self.engine.snapshots().clear_complete(resource).await?;

        info!("Invalidated {}", name);
        self.events
            .log("cache.invalidated", &serde_json::json!({"resource": name}))
            .await;
        Ok(())
    }

    pub async fn handle_action(&self, name: &str, request: CacheActionRequest) -> MirrorResult<()> {
        match request.action {
            CacheAction::Invalidate => self.invalidate(name).await,
        }
    }

    /// Orchestrator API over every resource in priority order
    pub async fn orchestrate(&self, refresh: bool) -> OrchestratorReport {
        let resources = self.resources.by_priority();
        self.orchestrator.run_all(&resources, refresh, &quiet).await
    }

    /// Orchestrate `names` in the given order (all resources when empty)
    pub async fn orchestrate_with(
        &self,
        names: &[String],
        refresh: bool,
        observer: &ProgressObserver<'_>,
    ) -> MirrorResult<OrchestratorReport> {
        let resources = if names.is_empty() {
            self.resources.by_priority()
        } else {
            self.resources.select(names)?
        };
        Ok(self.orchestrator.run_all(&resources, refresh, observer).await)
    }

    pub async fn pause(&self, name: &str) -> MirrorResult<()> {
        let resource = self.resources.get(name)?;
        self.engine.pause_control().pause(resource).await?;

        info!("Paused {}", name);
        self.events
            .log("resource.paused", &serde_json::json!({"resource": name}))
            .await;
        Ok(())
    }

    pub async fn resume(&self, name: &str) -> MirrorResult<()> {
        let resource = self.resources.get(name)?;
        self.engine.pause_control().resume(resource).await?;

        info!("Resumed {}", name);
        self.events
            .log("resource.resumed", &serde_json::json!({"resource": name}))
            .await;
        Ok(())
    }

    pub async fn is_paused(&self, name: &str) -> MirrorResult<bool> {
        let resource = self.resources.get(name)?;
        self.engine.pause_control().is_paused(resource).await
    }

    /// Stored state of every configured resource, in declaration order
    pub async fn status(&self) -> MirrorResult<Vec<ResourceStatus>> {
        let mut statuses = Vec::with_capacity(self.resources.len());
        for resource in self.resources.iter() {
            statuses.push(self.resource_status(resource).await?);
        }
        Ok(statuses)
    }

    async fn resource_status(&self, resource: &ResourceDescriptor) -> MirrorResult<ResourceStatus> {
        let snapshots = self.engine.snapshots();
        Ok(ResourceStatus {
            name: resource.name.clone(),
            table: resource.table.clone(),
            priority: resource.priority,
            cache: snapshots.state(resource).await?,
            resumable: snapshots.load_position(resource).await?.is_some(),
            paused: self.engine.pause_control().is_paused(resource).await?,
            locked: self.engine.lock().holder(resource).await.is_some(),
            progress: self.engine.progress().snapshot(resource).await,
            chunks: ChunkWriter::manifest_of(&**self.engine.store(), resource).await?,
        })
    }

    /// Wait for background scans to finish
    pub async fn shutdown(&self) {
        let stats = self.pool.stats();
        if stats.running > 0 {
            info!("Waiting for {} background scans", stats.running);
        }
        self.pool.drain().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::engine::ProgressStatus;
    use crate::error::MirrorError;
    use crate::source::{ScanPage, ScanToken};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// Five records, two per page
    struct FiveRecords;

    #[async_trait]
    impl SourceScanner for FiveRecords {
        async fn scan(
            &self,
            _table: &str,
            page_size: usize,
            token: Option<&ScanToken>,
        ) -> MirrorResult<ScanPage> {
            let offset = token.and_then(|t| t.as_value().as_u64()).unwrap_or(0) as usize;
            let end = (offset + page_size).min(5);
            Ok(ScanPage {
                items: (offset..end).map(|i| json!({ "id": i })).collect(),
                next_token: (end < 5).then(|| ScanToken::new(json!(end))),
            })
        }

        fn scanner_name(&self) -> &'static str {
            "five"
        }
    }

    fn service(memory: Arc<MemoryStore>) -> MirrorService {
        let mut config = ResourceConfig::new("designs", "designs");
        config.page_size = 2;
        let resources = ResourceSet::new(vec![
            ResourceDescriptor::from_config(&config, "mirror").unwrap()
        ]);
        let settings = EngineSettings {
            page_delay: Duration::ZERO,
            lock_retry_delay: Duration::ZERO,
            ..EngineSettings::default()
        };
        MirrorService::new(
            resources,
            memory,
            Arc::new(FiveRecords),
            settings,
            EventLog::disabled(),
        )
    }

    #[tokio::test]
    async fn read_page_paginates_complete_snapshot() {
        let service = service(Arc::new(MemoryStore::new()));

        let first = service
            .read_page("designs", &ReadQuery::page(3, None))
            .await
            .unwrap();
        assert!(first.is_complete);
        assert_eq!(first.total, 5);
        assert_eq!(first.items.len(), 3);

        let rest = service
            .read_page("designs", &ReadQuery::page(3, first.last_evaluated_key))
            .await
            .unwrap();
        assert_eq!(rest.items, vec![json!({"id": 3}), json!({"id": 4})]);
        assert!(rest.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn unknown_resource_is_an_error() {
        let service = service(Arc::new(MemoryStore::new()));
        let err = service
            .read_page("widgets", &ReadQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::UnknownResource(_)));
        assert!(service.invalidate("widgets").await.is_err());
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let memory = Arc::new(MemoryStore::new());
        let service = service(memory.clone());

        service.invalidate("designs").await.unwrap();
        service.read_page("designs", &ReadQuery::default()).await.unwrap();
        assert!(memory.contains("mirror:designs:complete"));

        let request = CacheActionRequest {
            action: CacheAction::Invalidate,
        };
        service.handle_action("designs", request).await.unwrap();
        service.handle_action("designs", request).await.unwrap();
        assert!(!memory.contains("mirror:designs:complete"));
    }

    #[tokio::test]
    async fn status_reflects_pause_and_completion() {
        let service = service(Arc::new(MemoryStore::new()));

        service.pause("designs").await.unwrap();
        let report = service.orchestrate(false).await;
        assert_eq!(report.get("designs").unwrap().status, ProgressStatus::Paused);

        let status = &service.status().await.unwrap()[0];
        assert!(status.paused);
        assert_eq!(status.cache, CacheState::Absent);

        service.resume("designs").await.unwrap();
        assert!(!service.is_paused("designs").await.unwrap());
        let report = service.orchestrate(false).await;
        assert!(report.all_complete());

        let status = &service.status().await.unwrap()[0];
        assert_eq!(status.cache, CacheState::Complete);
        assert_eq!(status.progress.status, ProgressStatus::Complete);
        assert!(!status.resumable);
        assert!(!status.locked);
        service.shutdown().await;
    }
}
