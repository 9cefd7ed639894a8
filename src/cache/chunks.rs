//! Chunked batch writer
//!
//! Mirrors a scan as a sequence of fixed-size chunks under
//! `{prefix}:{name}:chunk:{i}`, with a manifest recording how many chunks
//! exist. Chunks are an export for downstream consumers; reads never
//! consult them.

use crate::error::MirrorResult;
use crate::resource::{ResourceDescriptor, ResourceKeys};
use crate::source::Record;
use crate::store::{get_json, set_json, KvStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Stored under `{prefix}:{name}:chunks`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    /// Chunks written, also the index of the next chunk
    pub chunks: usize,
    /// Records across all written chunks
    pub records: usize,
}

/// Buffers scanned records and persists them in chunks
pub struct ChunkWriter {
    store: Arc<dyn KvStore>,
    keys: ResourceKeys,
    ttl: Duration,
    chunk_size: Option<usize>,
    buffer: Vec<Record>,
    manifest: ChunkManifest,
}

impl ChunkWriter {
    /// Start a writer for one scan of `resource`
    ///
    /// A resumed scan continues numbering after the existing chunks; a
    /// fresh scan purges them first. Without a chunk size the writer is
    /// inert and touches nothing.
    pub async fn start(
        store: Arc<dyn KvStore>,
        resource: &ResourceDescriptor,
        resume: bool,
    ) -> MirrorResult<Self> {
        let mut manifest = ChunkManifest::default();

        if resource.chunk_size.is_some() {
            if resume {
                manifest = Self::manifest_of(&*store, resource)
                    .await?
                    .unwrap_or_default();
            } else {
                Self::purge(&*store, resource).await?;
            }
        }

        Ok(Self {
            store,
            keys: resource.keys().clone(),
            ttl: resource.ttl,
            chunk_size: resource.chunk_size,
            buffer: Vec::new(),
            manifest,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.chunk_size.is_some()
    }

    pub fn manifest(&self) -> ChunkManifest {
        self.manifest
    }

    /// Records waiting for a full chunk
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer `records`, writing every chunk that fills up
    pub async fn append(&mut self, records: &[Record]) -> MirrorResult<()> {
        let Some(size) = self.chunk_size else {
            return Ok(());
        };

        self.buffer.extend_from_slice(records);
        while self.buffer.len() >= size {
            let chunk: Vec<Record> = self.buffer.drain(..size).collect();
            self.write_chunk(&chunk).await?;
        }
        Ok(())
    }

    /// Write whatever remains in the buffer as a final, shorter chunk
    pub async fn finish(&mut self) -> MirrorResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.buffer);
        self.write_chunk(&chunk).await
    }

    async fn write_chunk(&mut self, chunk: &[Record]) -> MirrorResult<()> {
        let index = self.manifest.chunks;
        set_json(&*self.store, &self.keys.chunk(index), chunk, self.ttl).await?;

        self.manifest.chunks += 1;
        self.manifest.records += chunk.len();
        set_json(&*self.store, &self.keys.chunk_manifest(), &self.manifest, self.ttl).await?;

        debug!("Wrote chunk {} of {} ({} records)", index, self.keys, chunk.len());
        Ok(())
    }

    /// Current manifest of `resource`, if any chunks were written
    pub async fn manifest_of(
        store: &dyn KvStore,
        resource: &ResourceDescriptor,
    ) -> MirrorResult<Option<ChunkManifest>> {
        get_json(store, &resource.keys().chunk_manifest()).await
    }

    /// Delete every chunk listed in the manifest, then the manifest
    ///
    /// Returns the number of chunks removed.
    pub async fn purge(store: &dyn KvStore, resource: &ResourceDescriptor) -> MirrorResult<usize> {
        let Some(manifest) = Self::manifest_of(store, resource).await? else {
            return Ok(0);
        };

        let keys = resource.keys();
        for index in 0..manifest.chunks {
            store.delete(&keys.chunk(index)).await?;
        }
        store.delete(&keys.chunk_manifest()).await?;

        debug!("Purged {} chunks of {}", manifest.chunks, resource.name);
        Ok(manifest.chunks)
    }
}
