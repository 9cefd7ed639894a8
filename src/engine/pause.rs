//! Operator pause flags
//!
//! A pause flag is honored at the next page boundary by whichever runner
//! holds the resource; the scan position is kept so a later run resumes.

use crate::error::MirrorResult;
use crate::resource::ResourceDescriptor;
use crate::store::KvStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct PauseControl {
    store: Arc<dyn KvStore>,
}

impl PauseControl {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Set the flag; it lives as long as the resource's partial snapshot
    pub async fn pause(&self, resource: &ResourceDescriptor) -> MirrorResult<()> {
        self.store
            .set(&resource.keys().pause(), b"1", resource.partial_ttl)
            .await
    }

    pub async fn resume(&self, resource: &ResourceDescriptor) -> MirrorResult<()> {
        self.store.delete(&resource.keys().pause()).await
    }

    pub async fn is_paused(&self, resource: &ResourceDescriptor) -> MirrorResult<bool> {
        Ok(self.store.get(&resource.keys().pause()).await?.is_some())
    }
}
