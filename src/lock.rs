//! Store-backed distributed lock
//!
//! Optimistic, self-healing mutual exclusion per resource. The lock record
//! is written with the store's atomic create-if-absent and carries its own
//! expiry, so a crashed holder never blocks other runners for longer than
//! the lock lifetime. A record older than the lifetime is stale and is
//! force-released before the next acquisition attempt.

use crate::events::EventLog;
use crate::resource::ResourceDescriptor;
use crate::store::{set_json, KvStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Value stored under a resource's lock key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Runner holding the lock
    pub owner: Uuid,
    /// Creation time in epoch milliseconds
    pub acquired_at: i64,
}

impl LockRecord {
    /// A record for `owner` created now
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            acquired_at: Utc::now().timestamp_millis(),
        }
    }

    /// Time since the record was written
    pub fn age(&self) -> Duration {
        let elapsed = Utc::now().timestamp_millis() - self.acquired_at;
        Duration::from_millis(elapsed.max(0) as u64)
    }

    /// Whether the record has outlived `lifetime`
    pub fn is_stale(&self, lifetime: Duration) -> bool {
        self.age() >= lifetime
    }
}

/// Per-resource lock held by one runner
///
/// Each instance has its own owner id; clones share it.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn KvStore>,
    owner: Uuid,
    lifetime: Duration,
    events: EventLog,
}

impl DistributedLock {
    /// Create a lock handle with a fresh owner id
    pub fn new(store: Arc<dyn KvStore>, lifetime: Duration) -> Self {
        Self {
            store,
            owner: Uuid::new_v4(),
            lifetime,
            events: EventLog::disabled(),
        }
    }

    /// Record takeovers in `events`
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    /// Owner id written into acquired records
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// Lock lifetime
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Acquire the lock for `resource`
    ///
    /// Force-releases a stale record first, then makes up to `retries`
    /// create-if-absent attempts (at least one), sleeping `retry_delay`
    /// between them. Returns false when a live lock is held elsewhere.
    pub async fn acquire(
        &self,
        resource: &ResourceDescriptor,
        retries: u32,
        retry_delay: Duration,
    ) -> bool {
        let key = resource.keys().lock();

        if let Some(stale) = self.stale_bytes(resource).await {
            warn!("Force-releasing stale lock for {}", resource.name);
            self.events
                .log(
                    "lock.takeover",
                    &serde_json::json!({"resource": resource.name, "owner": self.owner}),
                )
                .await;
            self.delete_if_unchanged(resource, &stale).await;
        }

        let attempts = retries.max(1);
        for attempt in 1..=attempts {
            let record = match serde_json::to_vec(&LockRecord::new(self.owner)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to encode lock record: {}", e);
                    return false;
                }
            };

            match self.store.set_if_absent(&key, &record, self.lifetime).await {
                Ok(true) => {
                    debug!("Acquired lock for {} (attempt {})", resource.name, attempt);
                    return true;
                }
                Ok(false) => debug!(
                    "Lock for {} held elsewhere (attempt {}/{})",
                    resource.name, attempt, attempts
                ),
                Err(e) => warn!("Lock attempt for {} failed: {}", resource.name, e),
            }

            if attempt < attempts {
                tokio::time::sleep(retry_delay).await;
            }
        }

        false
    }

    /// Single acquisition attempt without waiting
    pub async fn try_acquire(&self, resource: &ResourceDescriptor) -> bool {
        self.acquire(resource, 1, Duration::ZERO).await
    }

    /// Delete the lock unconditionally
    ///
    /// Never fails: store errors are logged, the record expires on its own.
    pub async fn release(&self, resource: &ResourceDescriptor) {
        match self.store.delete(&resource.keys().lock()).await {
            Ok(()) => debug!("Released lock for {}", resource.name),
            Err(e) => warn!("Failed to release lock for {}: {}", resource.name, e),
        }
    }

    /// Delete the lock only while this runner still owns it
    ///
    /// Returns false when the record is gone or belongs to another runner,
    /// which happens after the lock expired and was taken over mid-scan.
    pub async fn release_if_owner(&self, resource: &ResourceDescriptor) -> bool {
        match self.holder(resource).await {
            Some(record) if record.owner == self.owner => {
                self.release(resource).await;
                true
            }
            Some(_) => {
                warn!(
                    "Not releasing lock for {}: now held by another runner",
                    resource.name
                );
                false
            }
            None => false,
        }
    }

    /// Current lock record, if any
    pub async fn holder(&self, resource: &ResourceDescriptor) -> Option<LockRecord> {
        match self.store.get(&resource.keys().lock()).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read lock for {}: {}", resource.name, e);
                None
            }
        }
    }

    /// Whether an existing lock has outlived the lifetime
    ///
    /// Absent locks are not stale; undecodable ones are.
    pub async fn is_stale(&self, resource: &ResourceDescriptor) -> bool {
        self.stale_bytes(resource).await.is_some()
    }

    /// Stored bytes of the lock record, if it is stale
    async fn stale_bytes(&self, resource: &ResourceDescriptor) -> Option<Vec<u8>> {
        match self.store.get(&resource.keys().lock()).await {
            Ok(Some(bytes)) => {
                let stale = serde_json::from_slice::<LockRecord>(&bytes)
                    .map(|record| record.is_stale(self.lifetime))
                    .unwrap_or(true);
                stale.then_some(bytes)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read lock for {}: {}", resource.name, e);
                None
            }
        }
    }

    /// Delete the lock record only if it still holds `expected`
    ///
    /// The store has no compare-and-delete, so a record written between
    /// the read and the delete is still removed. The window is one store
    /// round trip; a runner losing its record that way fails its next
    /// `renew` and stops.
    async fn delete_if_unchanged(&self, resource: &ResourceDescriptor, expected: &[u8]) -> bool {
        match self.store.get(&resource.keys().lock()).await {
            Ok(Some(current)) if current == expected => {
                self.release(resource).await;
                true
            }
            Ok(_) => {
                debug!("Lock for {} changed before takeover", resource.name);
                false
            }
            Err(e) => {
                warn!("Failed to read lock for {}: {}", resource.name, e);
                false
            }
        }
    }

    /// Refresh a held lock
    ///
    /// Returns false if the lock is gone, stale, or owned by another
    /// runner; the caller must stop mutating the resource. The ownership
    /// check and the rewrite are separate store calls: a takeover landing
    /// between them is overwritten, and that runner stops at its own next
    /// renewal.
    pub async fn renew(&self, resource: &ResourceDescriptor) -> bool {
        let Some(current) = self.holder(resource).await else {
            return false;
        };

        if current.owner != self.owner || current.is_stale(self.lifetime) {
            return false;
        }

        let record = LockRecord::new(self.owner);
        match set_json(&*self.store, &resource.keys().lock(), &record, self.lifetime).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to renew lock for {}: {}", resource.name, e);
                false
            }
        }
    }
}
