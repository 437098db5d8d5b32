//! Stack state keyed by deployment target.
//!
//! A stack name is only unique inside one account and region, so the
//! in-memory provider keeps one partition per (account id, region) and looks
//! stacks up by name within it.

use std::sync::Arc;

use dashmap::DashMap;

use lzstack_model::{AccountId, AwsRegion};

/// Partitions of `T`, one per (account id, region), created on first write.
///
/// ```
/// use lzstack_core::state::AccountRegionStore;
/// use lzstack_model::{AccountId, AwsRegion};
///
/// #[derive(Debug, Default)]
/// struct Stacks {
///     names: parking_lot::Mutex<Vec<String>>,
/// }
///
/// let store = AccountRegionStore::<Stacks>::new();
/// let dev = AccountId::new("333333333333").unwrap();
/// let region = AwsRegion::new("eu-west-1");
/// store.get_or_create(&dev, &region).names.lock().push("LZ-baseline".to_owned());
///
/// assert!(store.get(&dev, &AwsRegion::new("us-east-1")).is_none());
/// assert_eq!(store.get(&dev, &region).unwrap().names.lock().len(), 1);
/// ```
#[derive(Debug)]
pub struct AccountRegionStore<T: Default + Send + Sync> {
    inner: DashMap<(AccountId, AwsRegion), Arc<T>>,
}

impl<T: Default + Send + Sync> AccountRegionStore<T> {
    /// Create a store with no partitions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Partition for a target, created empty if this is its first stack.
    #[must_use]
    pub fn get_or_create(&self, account: &AccountId, region: &AwsRegion) -> Arc<T> {
        self.inner
            .entry((account.clone(), region.clone()))
            .or_insert_with(|| Arc::new(T::default()))
            .clone()
    }

    /// Partition for a target, or `None` if nothing was ever stored there.
    #[must_use]
    pub fn get(&self, account: &AccountId, region: &AwsRegion) -> Option<Arc<T>> {
        self.inner
            .get(&(account.clone(), region.clone()))
            .map(|v| Arc::clone(v.value()))
    }

    /// Number of (account, region) partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no target has stored anything yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T: Default + Send + Sync> Default for AccountRegionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
