//! Run-scoped stack handle registry.
//!
//! [`StackRegistry`] hands out exactly one [`StackHandle`] per normalized
//! [`Target`]. All writers to a target go through that handle, whose upsert
//! lock serializes mutations of the underlying stack.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use lzstack_model::{AwsRegion, StackState, Target};

/// One deployment unit bound to one target.
#[derive(Debug)]
pub struct StackHandle {
    target: Target,
    name: String,
    status: RwLock<HandleStatus>,
    upsert_lock: Mutex<()>,
}

#[derive(Debug, Default)]
struct HandleStatus {
    state: StackState,
    stack_id: Option<String>,
}

impl StackHandle {
    fn new(target: Target, name: String) -> Self {
        Self {
            target,
            name,
            status: RwLock::new(HandleStatus::default()),
            upsert_lock: Mutex::new(()),
        }
    }

    /// The target this handle is bound to.
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Handle name, `{prefix}-{account}-{region}`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StackState {
        self.status.read().state
    }

    /// Last known provider stack id.
    #[must_use]
    pub fn stack_id(&self) -> Option<String> {
        self.status.read().stack_id.clone()
    }

    /// Acquire the per-target upsert lock.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.upsert_lock.lock().await
    }

    pub(crate) fn mark_pending(&self) {
        self.status.write().state = StackState::Pending;
    }

    pub(crate) fn mark_created(&self, stack_id: String) {
        let mut status = self.status.write();
        status.state = StackState::Created;
        status.stack_id = Some(stack_id);
    }

    /// Restore the settled state after a failed upsert.
    pub(crate) fn mark_settled(&self) {
        let mut status = self.status.write();
        status.state = if status.stack_id.is_some() {
            StackState::Created
        } else {
            StackState::Missing
        };
    }
}

/// Lazily populated map from target to stack handle.
#[derive(Debug)]
pub struct StackRegistry {
    handles: DashMap<Target, Arc<StackHandle>>,
    home_region: AwsRegion,
    name_prefix: String,
}

impl StackRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(home_region: AwsRegion, name_prefix: impl Into<String>) -> Self {
        Self {
            handles: DashMap::new(),
            home_region,
            name_prefix: name_prefix.into(),
        }
    }

    /// Build a normalized target; an omitted or blank region means the home
    /// region.
    #[must_use]
    pub fn target(&self, account_key: &str, region: Option<&str>) -> Target {
        Target::new(
            account_key.trim(),
            AwsRegion::or_home(region, &self.home_region),
        )
    }

    /// Get the handle for a target, creating it on first request.
    #[must_use]
    pub fn get_or_create(&self, target: &Target) -> Arc<StackHandle> {
        let key = self.normalize(target);
        self.handles
            .entry(key.clone())
            .or_insert_with(|| {
                let name = self.handle_name(&key);
                debug!(target = %key, stack_name = %name, "creating stack handle");
                Arc::new(StackHandle::new(key, name))
            })
            .clone()
    }

    /// Get the handle for a target without creating one.
    #[must_use]
    pub fn try_get(&self, target: &Target) -> Option<Arc<StackHandle>> {
        self.handles
            .get(&self.normalize(target))
            .map(|h| Arc::clone(h.value()))
    }

    /// All handles, sorted by target.
    #[must_use]
    pub fn handles(&self) -> Vec<Arc<StackHandle>> {
        let mut handles: Vec<Arc<StackHandle>> =
            self.handles.iter().map(|h| Arc::clone(h.value())).collect();
        handles.sort_by(|a, b| a.target.cmp(&b.target));
        handles
    }

    /// Number of handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handle has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn normalize(&self, target: &Target) -> Target {
        self.target(&target.account_key, Some(target.region.as_str()))
    }

    fn handle_name(&self, target: &Target) -> String {
        let name = format!("{}-{}-{}", self.name_prefix, target.account_key, target.region);
        name.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect()
    }
}
