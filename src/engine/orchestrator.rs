//! Multi-resource orchestrator
//!
//! Runs scans one resource at a time in the order given, usually priority
//! order. A failing resource is recorded and the rest still run.

use super::fetch::{FetchEngine, FetchOutcome, ProgressObserver};
use super::progress::ProgressStatus;
use crate::events::EventLog;
use crate::resource::ResourceDescriptor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Final state of one resource after a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSummary {
    pub name: String,
    pub status: ProgressStatus,
    pub progress: u8,
    pub count: usize,
    pub pages: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub skipped: bool,
}

impl From<&FetchOutcome> for ResourceSummary {
    fn from(outcome: &FetchOutcome) -> Self {
        Self {
            name: outcome.resource.clone(),
            status: outcome.status,
            progress: if outcome.is_complete() { 100 } else { 0 },
            count: outcome.count(),
            pages: outcome.pages,
            error: outcome.error.clone(),
            skipped: outcome.skipped,
        }
    }
}

/// Summary of an orchestrator run
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub resources: Vec<ResourceSummary>,
}

impl OrchestratorReport {
    pub fn get(&self, name: &str) -> Option<&ResourceSummary> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn all_complete(&self) -> bool {
        self.resources
            .iter()
            .all(|r| r.status == ProgressStatus::Complete)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ResourceSummary> {
        self.resources
            .iter()
            .filter(|r| r.status == ProgressStatus::Error)
    }
}

pub struct Orchestrator {
    engine: Arc<FetchEngine>,
    events: EventLog,
}

impl Orchestrator {
    pub fn new(engine: Arc<FetchEngine>) -> Self {
        Self {
            engine,
            events: EventLog::disabled(),
        }
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    /// Scan every resource in `resources`, in order
    ///
    /// With `force_refresh` the cached state of every resource is purged
    /// before the first scan, so each restarts from its first page.
    pub async fn run_all(
        &self,
        resources: &[&ResourceDescriptor],
        force_refresh: bool,
        observer: &ProgressObserver<'_>,
    ) -> OrchestratorReport {
        let started_at = Utc::now();
        let mut summaries = Vec::with_capacity(resources.len());

        if force_refresh {
            for resource in resources {
                if let Err(e) = self.engine.purge(resource).await {
                    warn!("Failed to purge {} before refresh: {}", resource.name, e);
                }
            }
        }

        for resource in resources {
            let outcome = self.engine.run(resource, observer).await;
            let mut summary = ResourceSummary::from(&outcome);
            if !outcome.is_complete() {
                summary.progress = self.engine.progress().snapshot(resource).await.percent;
            }
            summaries.push(summary);
        }

        let report = OrchestratorReport {
            started_at,
            finished_at: Utc::now(),
            resources: summaries,
        };

        info!(
            "Orchestrator finished: {}/{} resources complete",
            report
                .resources
                .iter()
                .filter(|r| r.status == ProgressStatus::Complete)
                .count(),
            report.resources.len()
        );
        self.events
            .log(
                "orchestrator.finished",
                &serde_json::json!({
                    "force_refresh": force_refresh,
                    "resources": report.resources,
                }),
            )
            .await;

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::engine::fetch::{quiet, EngineSettings};
    use crate::error::{MirrorError, MirrorResult};
    use crate::source::{ScanPage, ScanToken, SourceScanner};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// Serves two single-record pages per table, failing `broken`
    struct TwoPageScanner {
        broken: &'static str,
    }

    #[async_trait]
    impl SourceScanner for TwoPageScanner {
        async fn scan(
            &self,
            table: &str,
            _page_size: usize,
            token: Option<&ScanToken>,
        ) -> MirrorResult<ScanPage> {
            if table == self.broken {
                return Err(MirrorError::SourceUnreachable(table.to_string()));
            }
            Ok(match token {
                None => ScanPage {
                    items: vec![json!({"page": 1})],
                    next_token: Some(ScanToken::new(json!(1))),
                },
                Some(_) => ScanPage {
                    items: vec![json!({"page": 2})],
                    next_token: None,
                },
            })
        }

        fn scanner_name(&self) -> &'static str {
            "two-page"
        }
    }

    fn descriptor(name: &str, priority: u32) -> ResourceDescriptor {
        let mut config = ResourceConfig::new(name, name);
        config.priority = priority;
        ResourceDescriptor::from_config(&config, "mirror").unwrap()
    }

    fn orchestrator(memory: &Arc<MemoryStore>) -> Orchestrator {
        let settings = EngineSettings {
            page_delay: Duration::ZERO,
            lock_retry_delay: Duration::ZERO,
            ..EngineSettings::default()
        };
        let scanner = Arc::new(TwoPageScanner { broken: "products" });
        Orchestrator::new(Arc::new(FetchEngine::new(memory.clone(), scanner, settings)))
    }

    #[tokio::test]
    async fn failure_does_not_stop_siblings() {
        let memory = Arc::new(MemoryStore::new());
        let orders = descriptor("orders", 0);
        let products = descriptor("products", 1);
        let pins = descriptor("pins", 2);

        let report = orchestrator(&memory)
            .run_all(&[&orders, &products, &pins], false, &quiet)
            .await;

        let names: Vec<_> = report.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "products", "pins"]);
        assert_eq!(report.get("orders").unwrap().status, ProgressStatus::Complete);
        assert_eq!(report.get("orders").unwrap().progress, 100);
        assert_eq!(report.get("pins").unwrap().count, 2);

        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "products");
        assert!(failed[0].error.as_ref().unwrap().contains("products"));
        assert!(!report.all_complete());
    }

    #[tokio::test]
    async fn refresh_rescans_from_scratch() {
        let memory = Arc::new(MemoryStore::new());
        let orders = descriptor("orders", 0);
        let orchestrator = orchestrator(&memory);

        let first = orchestrator.run_all(&[&orders], false, &quiet).await;
        assert_eq!(first.get("orders").unwrap().pages, 2);

        let refreshed = orchestrator.run_all(&[&orders], true, &quiet).await;
        let summary = refreshed.get("orders").unwrap();
        assert_eq!(summary.status, ProgressStatus::Complete);
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.count, 2);
        assert!(refreshed.all_complete());
    }
}
