//! Mirrorcache - resumable cache population for paginated tables
//!
//! Mirrors slow, paginated source tables into a shared key-value store.
//! Scans survive crashes and restarts, readers are never blocked by a
//! running scan, and concurrent runners coordinate through a store-backed
//! lock.

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod lock;
pub mod resource;
pub mod service;
pub mod source;
pub mod store;
pub mod ui;

pub use error::{MirrorError, MirrorResult};
pub use service::MirrorService;
