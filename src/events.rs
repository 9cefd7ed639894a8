//! Operator event log
//!
//! Writes JSON lines to `~/.local/state/mirrorcache/events.log`: lock
//! takeovers, invalidations, pause changes, background failures and
//! orchestrator runs.

use crate::config::{schema::Config, ConfigManager};
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File-based event logger that appends JSON lines
#[derive(Debug, Clone)]
pub struct EventLog {
    enabled: bool,
    path: PathBuf,
}

impl EventLog {
    /// Create a new event logger from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.event_log,
            path: ConfigManager::event_log_path(),
        }
    }

    /// Event logger writing to an explicit path
    pub fn at(path: PathBuf) -> Self {
        Self {
            enabled: true,
            path,
        }
    }

    /// Event logger that drops everything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
        }
    }

    /// Log an event as a JSON line
    ///
    /// Silently drops events on IO failure; the event log must never
    /// block or fail a scan.
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write event log: {}", e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
