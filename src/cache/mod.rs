//! Mirror cache state
//!
//! Each resource moves through these states as scans progress:
//!
//! | State | Keys present | Reads return |
//! |-------|--------------|--------------|
//! | Absent | none | empty, scan triggered |
//! | Partial | `partial`, `position` | records so far, scan continued |
//! | Complete | `complete` | every record |
//!
//! A complete snapshot replaces the partial one only once the scan has
//! reached the end of the table; it is never written from a failed scan.
//! Chunks (`chunk:{i}` plus the `chunks` manifest) are written alongside
//! for downstream consumers and do not take part in reads.

pub mod chunks;
pub mod entry;
pub mod manager;

pub use chunks::{ChunkManifest, ChunkWriter};
pub use entry::{CacheEntry, CacheState, SnapshotStore};
pub use manager::{CacheStateManager, ReadOutcome, ReadSource};
