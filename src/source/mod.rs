//! Paginated source scanner abstraction
//!
//! The scanner is the source of truth the engine mirrors. It hands out
//! pages in the order defined by its own continuation tokens; the engine
//! only ever tests a token for presence and persists it verbatim.

mod jsonl;

pub use jsonl::JsonlScanner;

use crate::config::{Config, SourceBackend};
use crate::error::MirrorResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A mirrored record
pub type Record = serde_json::Value;

/// Opaque continuation token returned by a scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanToken(serde_json::Value);

impl ScanToken {
    /// Wrap a scanner-specific token value
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// The raw token value
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// One page of a scan
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// Records on this page
    pub items: Vec<Record>,
    /// Token for the next page; `None` at the end of the table
    pub next_token: Option<ScanToken>,
}

impl ScanPage {
    /// Whether this page is the last one of the table
    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }
}

/// Abstract paginated scanner interface
#[async_trait]
pub trait SourceScanner: Send + Sync {
    /// Fetch up to `page_size` records of `table`, starting after `token`
    async fn scan(
        &self,
        table: &str,
        page_size: usize,
        token: Option<&ScanToken>,
    ) -> MirrorResult<ScanPage>;

    /// Get the human-readable scanner name for display
    fn scanner_name(&self) -> &'static str;
}

/// Create the scanner selected by the configuration
pub fn create_scanner(config: &Config) -> MirrorResult<Arc<dyn SourceScanner>> {
    match config.source.backend {
        SourceBackend::Jsonl => Ok(Arc::new(JsonlScanner::new(config.source.path.clone()))),
    }
}
