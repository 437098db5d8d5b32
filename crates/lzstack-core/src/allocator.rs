//! Exactly-once allocation of shared resources per (target, kind).
//!
//! Several producers may ask for the same shared resource on the same target
//! (e.g. every shared VPC needs the consumer account's default EBS key). The
//! first caller allocates; concurrent callers wait for it and reuse the
//! result. A failed allocation leaves the key empty so a later call can try
//! again.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use lzstack_model::{LzError, ResourceRef, Target};

type RecordKey = (Target, String);

/// Run-scoped record of allocated shared resources.
#[derive(Debug, Default)]
pub struct SharedKeyAllocator {
    records: DashMap<RecordKey, Arc<OnceCell<ResourceRef>>>,
    allocations: AtomicUsize,
}

impl SharedKeyAllocator {
    /// Create an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the resource of `kind` on `target`, calling `allocate` only if
    /// none has been recorded yet.
    pub async fn ensure<F, Fut>(
        &self,
        target: &Target,
        kind: &str,
        allocate: F,
    ) -> Result<ResourceRef, LzError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResourceRef, LzError>>,
    {
        let cell = self.cell(target, kind);
        if let Some(existing) = cell.get() {
            debug!(target = %target, kind, "shared resource already allocated");
            return Ok(existing.clone());
        }

        let record = cell
            .get_or_try_init(|| {
                self.allocations.fetch_add(1, Ordering::SeqCst);
                info!(target = %target, kind, "allocating shared resource");
                allocate()
            })
            .await?;
        Ok(record.clone())
    }

    /// The recorded resource, if any.
    #[must_use]
    pub fn get(&self, target: &Target, kind: &str) -> Option<ResourceRef> {
        self.records
            .get(&(target.clone(), kind.to_owned()))
            .and_then(|cell| cell.get().cloned())
    }

    /// Seed a record allocated elsewhere. Returns `false` if one exists.
    pub fn record(&self, resource: ResourceRef) -> bool {
        let cell = self.cell(&resource.target, &resource.kind);
        cell.set(resource).is_ok()
    }

    /// Number of recorded resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.iter().filter(|r| r.value().initialized()).count()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times an allocation closure was started.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    fn cell(&self, target: &Target, kind: &str) -> Arc<OnceCell<ResourceRef>> {
        self.records
            .entry((target.clone(), kind.to_owned()))
            .or_default()
            .clone()
    }
}
