//! Resource descriptors
//!
//! A descriptor is the only place resource-specific behavior lives: which
//! table to scan, how long snapshots live, how pages are sized and chunked,
//! and which attributes each record keeps.

pub mod keys;

pub use keys::ResourceKeys;

use crate::config::{Config, ResourceConfig};
use crate::error::{MirrorError, MirrorResult};
use crate::source::Record;
use std::time::Duration;

/// Static configuration of one mirrored table
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Logical name
    pub name: String,
    /// Backing table identifier
    pub table: String,
    /// Lifetime of the complete snapshot and its chunks
    pub ttl: Duration,
    /// Lifetime of the partial snapshot and scan position
    pub partial_ttl: Duration,
    /// Records per scanned page
    pub page_size: usize,
    /// Lower runs first
    pub priority: u32,
    /// Records per chunk, if chunking is enabled
    pub chunk_size: Option<usize>,
    /// Percent denominator
    pub estimated_total: Option<u64>,
    /// Attributes kept from each record
    pub fields: Vec<String>,
    keys: ResourceKeys,
}

impl ResourceDescriptor {
    /// Build a descriptor from its config entry
    pub fn from_config(config: &ResourceConfig, key_prefix: &str) -> MirrorResult<Self> {
        if config.table.trim().is_empty() {
            return Err(MirrorError::MissingTableName(config.name.clone()));
        }
        if config.page_size == 0 {
            return Err(MirrorError::ResourceInvalid {
                resource: config.name.clone(),
                reason: "page_size must be positive".to_string(),
            });
        }

        let ttl = Duration::from_secs(config.ttl_secs);
        Ok(Self {
            name: config.name.clone(),
            table: config.table.clone(),
            ttl,
            partial_ttl: config.partial_ttl_secs.map(Duration::from_secs).unwrap_or(ttl),
            page_size: config.page_size,
            priority: config.priority,
            chunk_size: config.chunk_size.filter(|size| *size > 0),
            estimated_total: config.estimated_total,
            fields: config.fields.clone(),
            keys: ResourceKeys::new(key_prefix, &config.name),
        })
    }

    /// Store keys for this resource
    pub fn keys(&self) -> &ResourceKeys {
        &self.keys
    }

    /// Project a scanned record down to the configured attributes
    pub fn map_record(&self, record: Record) -> Record {
        if self.fields.is_empty() {
            return record;
        }

        match record {
            Record::Object(mut map) => {
                map.retain(|key, _| self.fields.iter().any(|f| f == key));
                Record::Object(map)
            }
            other => other,
        }
    }

    /// Advisory percent for `count` records while a scan is running
    ///
    /// Never reports 100 before the scan actually terminates.
    pub fn estimate_percent(&self, count: u64) -> u8 {
        match self.estimated_total {
            Some(total) if total > 0 => {
                let percent = count.saturating_mul(100) / total;
                percent.min(99) as u8
            }
            _ => 0,
        }
    }
}

/// The configured resources
#[derive(Debug, Clone)]
pub struct ResourceSet {
    resources: Vec<ResourceDescriptor>,
}

impl ResourceSet {
    /// Wrap already built descriptors
    pub fn new(resources: Vec<ResourceDescriptor>) -> Self {
        Self { resources }
    }

    /// Build every descriptor declared in the config
    pub fn from_config(config: &Config) -> MirrorResult<Self> {
        let resources = config
            .resources
            .iter()
            .map(|r| ResourceDescriptor::from_config(r, &config.store.key_prefix))
            .collect::<MirrorResult<Vec<_>>>()?;
        Ok(Self::new(resources))
    }

    /// Look up a resource by name
    pub fn get(&self, name: &str) -> MirrorResult<&ResourceDescriptor> {
        self.resources
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| MirrorError::UnknownResource(name.to_string()))
    }

    /// Resources in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.iter()
    }

    /// Resources sorted by priority rank, ties kept in declaration order
    pub fn by_priority(&self) -> Vec<&ResourceDescriptor> {
        let mut ordered: Vec<_> = self.resources.iter().collect();
        ordered.sort_by_key(|r| r.priority);
        ordered
    }

    /// Resources named in `names`, in that order
    pub fn select(&self, names: &[String]) -> MirrorResult<Vec<&ResourceDescriptor>> {
        names.iter().map(|name| self.get(name)).collect()
    }

    /// Resource names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
