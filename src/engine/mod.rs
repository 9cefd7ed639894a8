//! Scan machinery
//!
//! - `fetch`: resumable scan of one resource under its lock
//! - `orchestrator`: sequential scans across resources
//! - `background`: bounded pool for scans continued off the read path
//! - `progress` / `pause`: observational records and operator control

pub mod background;
pub mod fetch;
pub mod orchestrator;
pub mod pause;
pub mod progress;

pub use background::{BackgroundPool, PoolStats, TaskFailure};
pub use fetch::{quiet, EngineSettings, FetchEngine, FetchOutcome, ProgressObserver};
pub use orchestrator::{Orchestrator, OrchestratorReport, ResourceSummary};
pub use pause::PauseControl;
pub use progress::{ProgressStatus, ProgressTracker, ResourceProgress};
