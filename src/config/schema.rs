//! Configuration schema for mirrorcache
//!
//! Configuration is stored at `~/.config/mirrorcache/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Key-value store settings
    pub store: StoreConfig,

    /// Source scanner settings
    pub source: SourceConfig,

    /// Engine tuning
    pub engine: EngineConfig,

    /// Mirrored resources, in declaration order
    pub resources: Vec<ResourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            store: StoreConfig::default(),
            source: SourceConfig::default(),
            engine: EngineConfig::default(),
            resources: default_resources(),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append operator events to the event log
    pub event_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            event_log: true,
        }
    }
}

/// Store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
    Redis,
}

/// Key-value store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to use
    pub backend: StoreBackend,

    /// Directory for the file backend (defaults to the state dir)
    pub path: Option<PathBuf>,

    /// Connection url for the redis backend
    pub url: Option<String>,

    /// Prefix for every key written by the engine
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: None,
            url: None,
            key_prefix: "mirror".to_string(),
        }
    }
}

/// Source scanner backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceBackend {
    Jsonl,
}

/// Source scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Backend to use
    pub backend: SourceBackend,

    /// Directory holding `{table}.jsonl` exports
    pub path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            backend: SourceBackend::Jsonl,
            path: PathBuf::from("data"),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lock lifetime in seconds (default: 5 minutes)
    pub lock_ttl_secs: u64,

    /// Acquisition attempts for scans started by the orchestrator
    pub lock_retries: u32,

    /// Delay between acquisition attempts in milliseconds
    pub lock_retry_delay_ms: u64,

    /// Acquisition attempts on the read path before falling back to empty
    pub read_lock_retries: u32,

    /// Pause between scanned pages in milliseconds
    pub page_delay_ms: u64,

    /// Lifetime of progress records in seconds
    pub progress_ttl_secs: u64,

    /// Maximum concurrently running background continuations
    pub background_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: 300,
            lock_retries: 3,
            lock_retry_delay_ms: 1000,
            read_lock_retries: 1,
            page_delay_ms: 100,
            progress_ttl_secs: 86_400,
            background_workers: 4,
        }
    }
}

/// One mirrored table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Logical resource name (used in keys and on the CLI)
    pub name: String,

    /// Backing table identifier handed to the scanner
    #[serde(default)]
    pub table: String,

    /// Complete-cache lifetime in seconds (default: 7 days)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Partial-cache and scan-position lifetime (defaults to ttl_secs)
    #[serde(default)]
    pub partial_ttl_secs: Option<u64>,

    /// Records requested per scanned page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Lower runs first
    #[serde(default)]
    pub priority: u32,

    /// Records per persisted chunk (unset disables chunking)
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Expected record count used for percent estimates
    #[serde(default)]
    pub estimated_total: Option<u64>,

    /// Attributes kept from each scanned record (empty keeps everything)
    #[serde(default)]
    pub fields: Vec<String>,
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_page_size() -> usize {
    100
}

impl ResourceConfig {
    /// Create a resource mirroring `table` with default tuning
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            ttl_secs: default_ttl_secs(),
            partial_ttl_secs: None,
            page_size: default_page_size(),
            priority: 0,
            chunk_size: None,
            estimated_total: None,
            fields: vec![],
        }
    }
}

fn default_resources() -> Vec<ResourceConfig> {
    let tables = [
        ("orders", 0, Some(1000), Some(20_000)),
        ("products", 1, Some(1000), Some(5_000)),
        ("pins", 2, None, Some(2_000)),
        ("boards", 3, None, Some(500)),
        ("designs", 4, None, Some(1_000)),
    ];

    tables
        .iter()
        .map(|(name, priority, chunk_size, estimated_total)| ResourceConfig {
            priority: *priority,
            chunk_size: *chunk_size,
            estimated_total: *estimated_total,
            ..ResourceConfig::new(name, name)
        })
        .collect()
}

impl Config {
    /// Check structural invariants, returning the first problem found
    pub fn validate(&self) -> Result<(), String> {
        if self.resources.is_empty() {
            return Err("at least one resource must be configured".to_string());
        }

        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.name.trim().is_empty() {
                return Err("resource name cannot be empty".to_string());
            }
            if !seen.insert(resource.name.as_str()) {
                return Err(format!("duplicate resource name: {}", resource.name));
            }
            if resource.table.trim().is_empty() {
                return Err(format!("missing table name for resource {}", resource.name));
            }
            if resource.page_size == 0 {
                return Err(format!("page_size must be positive for {}", resource.name));
            }
            if resource.ttl_secs == 0 || resource.partial_ttl_secs == Some(0) {
                return Err(format!("ttl must be positive for {}", resource.name));
            }
            if resource.chunk_size == Some(0) {
                return Err(format!("chunk_size must be positive for {}", resource.name));
            }
        }

        if self.engine.lock_ttl_secs == 0 {
            return Err("engine.lock_ttl_secs must be positive".to_string());
        }
        if self.engine.background_workers == 0 {
            return Err("engine.background_workers must be positive".to_string());
        }
        if self.store.backend == StoreBackend::Redis && self.store.url.is_none() {
            return Err("store.url is required for the redis backend".to_string());
        }

        Ok(())
    }
}
