//! Sharing predicates that expand one account's ownership to consumers.

use std::collections::BTreeSet;

use lzstack_model::{Account, VpcShareSpec};

use crate::directory::ou_member_keys;

/// Reports the consumer accounts of a resource owned by an account in
/// `ou_key`.
///
/// Implementations must be deterministic and should only return keys that
/// exist in the account directory.
pub trait SharingPredicate: Send + Sync {
    /// Consumer account keys.
    fn consumers(&self, accounts: &[Account], ou_key: &str) -> Vec<String>;
}

impl<F> SharingPredicate for F
where
    F: Fn(&[Account], &str) -> Vec<String> + Send + Sync,
{
    fn consumers(&self, accounts: &[Account], ou_key: &str) -> Vec<String> {
        self(accounts, ou_key)
    }
}

/// Consumers of a shared VPC: the owner's OU members and/or listed accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VpcSharing {
    spec: VpcShareSpec,
}

impl VpcSharing {
    /// Create a predicate from a sharing spec.
    #[must_use]
    pub fn new(spec: VpcShareSpec) -> Self {
        Self { spec }
    }
}

impl SharingPredicate for VpcSharing {
    fn consumers(&self, accounts: &[Account], ou_key: &str) -> Vec<String> {
        let mut keys = BTreeSet::new();
        if self.spec.share_to_ou_accounts {
            keys.extend(ou_member_keys(accounts, ou_key));
        }
        keys.extend(self.spec.share_to_specific_accounts.iter().cloned());
        keys.into_iter().collect()
    }
}
