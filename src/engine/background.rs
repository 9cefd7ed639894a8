//! Bounded pool for background scan continuations
//!
//! Submission never blocks: when every worker is busy the task is refused
//! and the caller decides what to do. Failures are counted and logged,
//! never propagated to whoever submitted the task.

use crate::error::MirrorResult;
use crate::events::EventLog;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, warn};

/// The most recent background failure
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub label: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Pool counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub running: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
    pub last_failure: Option<TaskFailure>,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    last_failure: Mutex<Option<TaskFailure>>,
}

impl Counters {
    fn record_failure(&self, label: &str, error: String) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_failure.lock() {
            *last = Some(TaskFailure {
                label: label.to_string(),
                error,
                at: Utc::now(),
            });
        }
    }
}

/// Fixed-size pool of background workers
pub struct BackgroundPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    counters: Arc<Counters>,
    tasks: Mutex<JoinSet<()>>,
    events: EventLog,
}

impl BackgroundPool {
    /// A pool running at most `workers` tasks at once (at least one)
    pub fn new(workers: usize) -> Self {
        let capacity = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            counters: Arc::new(Counters::default()),
            tasks: Mutex::new(JoinSet::new()),
            events: EventLog::disabled(),
        }
    }

    /// Record failures in `events`
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    /// Run `task` on a free worker
    ///
    /// Returns false without running it when the pool is saturated.
    /// Must be called from within a tokio runtime.
    pub fn submit<F>(&self, label: impl Into<String>, task: F) -> bool
    where
        F: Future<Output = MirrorResult<()>> + Send + 'static,
    {
        let label = label.into();

        let Ok(permit) = self.permits.clone().try_acquire_owned() else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("Background pool saturated, rejected {}", label);
            return false;
        };

        let Ok(mut tasks) = self.tasks.lock() else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            error!("Background pool state poisoned, rejected {}", label);
            return false;
        };

        // Reap finished tasks so the set does not grow without bound
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                self.record_join_error(e);
            }
        }

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let counters = self.counters.clone();
        let events = self.events.clone();

        tasks.spawn(async move {
            let _permit = permit;
            match task.await {
                Ok(()) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                    debug!("Background task {} finished", label);
                }
                Err(e) => {
                    error!("Background task {} failed: {}", label, e);
                    counters.record_failure(&label, e.to_string());
                    events
                        .log(
                            "background.failed",
                            &serde_json::json!({"task": label, "error": e.to_string()}),
                        )
                        .await;
                }
            }
        });

        debug!("Submitted background task");
        true
    }

    fn record_join_error(&self, e: JoinError) {
        if e.is_panic() {
            error!("Background task panicked");
            self.counters.record_failure("panicked task", e.to_string());
        }
    }

    /// Wait for every submitted task to finish
    pub async fn drain(&self) {
        let mut tasks = {
            let Ok(mut guard) = self.tasks.lock() else {
                return;
            };
            std::mem::take(&mut *guard)
        };

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                self.record_join_error(e);
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Workers currently free
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            running: self.capacity - self.available().min(self.capacity),
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            last_failure: self
                .counters
                .last_failure
                .lock()
                .ok()
                .and_then(|last| last.clone()),
        }
    }
}
