//! Scripted scanners and builders shared by the engine tests

use async_trait::async_trait;
use mirrorcache::config::ResourceConfig;
use mirrorcache::engine::{EngineSettings, FetchEngine, PauseControl};
use mirrorcache::error::{MirrorError, MirrorResult};
use mirrorcache::resource::ResourceDescriptor;
use mirrorcache::source::{ScanPage, ScanToken, SourceScanner};
use mirrorcache::store::KvStore;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// A latch that holds waiters until opened
#[derive(Default)]
pub struct Gate {
    open: AtomicBool,
    notify: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.open.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

/// Scanner over `total` numbered records per table
///
/// Tokens are plain offsets. Every requested offset is recorded so tests
/// can tell which pages were fetched twice.
pub struct ScriptedScanner {
    total: usize,
    requested: Mutex<Vec<usize>>,
    fail_once_at: Mutex<Option<usize>>,
    broken_table: Option<String>,
    gate: Option<Arc<Gate>>,
    pause_on_first: Option<(PauseControl, ResourceDescriptor)>,
}

impl ScriptedScanner {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            requested: Mutex::new(Vec::new()),
            fail_once_at: Mutex::new(None),
            broken_table: None,
            gate: None,
            pause_on_first: None,
        }
    }

    /// Fail the first request for `offset`, succeed afterwards
    pub fn failing_once_at(self, offset: usize) -> Self {
        *self.fail_once_at.lock().unwrap() = Some(offset);
        self
    }

    /// Fail every request for `table`
    pub fn breaking(mut self, table: &str) -> Self {
        self.broken_table = Some(table.to_string());
        self
    }

    /// Hold every page after the first until `gate` opens
    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Raise the pause flag of `resource` while serving its first page
    pub fn pausing(mut self, store: Arc<dyn KvStore>, resource: &ResourceDescriptor) -> Self {
        self.pause_on_first = Some((PauseControl::new(store), resource.clone()));
        self
    }

    pub fn requested(&self) -> Vec<usize> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceScanner for ScriptedScanner {
    async fn scan(
        &self,
        table: &str,
        page_size: usize,
        token: Option<&ScanToken>,
    ) -> MirrorResult<ScanPage> {
        let offset = token.and_then(|t| t.as_value().as_u64()).unwrap_or(0) as usize;
        self.requested.lock().unwrap().push(offset);

        if self.broken_table.as_deref() == Some(table) {
            return Err(MirrorError::SourceTableNotFound {
                table: table.to_string(),
            });
        }

        let fail = {
            let mut fail_at = self.fail_once_at.lock().unwrap();
            if *fail_at == Some(offset) {
                *fail_at = None;
                true
            } else {
                false
            }
        };
        if fail {
            return Err(MirrorError::scan(table, "throttled"));
        }

        if offset > 0 {
            if let Some(ref gate) = self.gate {
                gate.wait().await;
            }
        } else if let Some((ref control, ref resource)) = self.pause_on_first {
            control.pause(resource).await?;
        }

        let end = (offset + page_size).min(self.total);
        Ok(ScanPage {
            items: (offset..end).map(|i| json!({ "id": i, "table": table })).collect(),
            next_token: (end < self.total).then(|| ScanToken::new(json!(end))),
        })
    }

    fn scanner_name(&self) -> &'static str {
        "scripted"
    }
}

pub fn resource(name: &str, page_size: usize) -> ResourceDescriptor {
    let config = ResourceConfig {
        page_size,
        ..ResourceConfig::new(name, name)
    };
    ResourceDescriptor::from_config(&config, "mirror").unwrap()
}

pub fn resource_with(config: ResourceConfig) -> ResourceDescriptor {
    ResourceDescriptor::from_config(&config, "mirror").unwrap()
}

pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        page_delay: Duration::ZERO,
        lock_retry_delay: Duration::ZERO,
        ..EngineSettings::default()
    }
}

pub fn engine(store: Arc<dyn KvStore>, scanner: Arc<ScriptedScanner>) -> Arc<FetchEngine> {
    Arc::new(FetchEngine::new(store, scanner, fast_settings()))
}
