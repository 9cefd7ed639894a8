//! Typed key builder for everything the engine stores per resource

use std::fmt;

/// Store keys owned by one resource
///
/// Every key shares the `{prefix}:{name}` base so that a resource's
/// footprint in the store can be listed or purged by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKeys {
    base: String,
}

impl ResourceKeys {
    /// Build the key set for `name` under `prefix`
    pub fn new(prefix: &str, name: &str) -> Self {
        Self {
            base: format!("{}:{}", prefix, name),
        }
    }

    /// Complete snapshot
    pub fn complete(&self) -> String {
        format!("{}:complete", self.base)
    }

    /// Partial snapshot of an in-flight scan
    pub fn partial(&self) -> String {
        format!("{}:partial", self.base)
    }

    /// Continuation token of the last scanned page
    pub fn position(&self) -> String {
        format!("{}:position", self.base)
    }

    /// Scan lock
    pub fn lock(&self) -> String {
        format!("{}:lock", self.base)
    }

    /// Chunk number `index`
    pub fn chunk(&self, index: usize) -> String {
        format!("{}:chunk:{}", self.base, index)
    }

    /// Chunk manifest (chunk and record counts)
    pub fn chunk_manifest(&self) -> String {
        format!("{}:chunks", self.base)
    }

    /// Observational progress record
    pub fn progress(&self) -> String {
        format!("{}:progress", self.base)
    }

    /// Operator pause flag
    pub fn pause(&self) -> String {
        format!("{}:paused", self.base)
    }
}

impl fmt::Display for ResourceKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)
    }
}
