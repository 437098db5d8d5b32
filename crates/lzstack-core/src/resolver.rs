//! Deployment-target resolution.
//!
//! [`TargetResolver`] turns an [`OwnershipRule`] and a region list into the
//! deduplicated, sorted set of (account, region) targets that must receive a
//! resource.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use lzstack_model::{Account, AwsRegion, LzError, OwnershipSpec, Target, Warning};

use crate::directory::AccountDirectory;
use crate::sharing::{SharingPredicate, VpcSharing};

/// Which accounts own a resource.
#[derive(Clone)]
pub enum OwnershipRule {
    /// One account.
    SingleAccount(String),
    /// A named set of accounts.
    AccountSet(Vec<String>),
    /// Every account in the directory.
    AllAccounts,
    /// The base account plus every consumer the predicate reports.
    SharedVia {
        /// Owning account key.
        base_account: String,
        /// Consumer expansion.
        predicate: Arc<dyn SharingPredicate>,
    },
}

impl OwnershipRule {
    /// Shorthand for [`OwnershipRule::SharedVia`].
    pub fn shared_via(
        base_account: impl Into<String>,
        predicate: impl SharingPredicate + 'static,
    ) -> Self {
        Self::SharedVia {
            base_account: base_account.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl From<OwnershipSpec> for OwnershipRule {
    fn from(spec: OwnershipSpec) -> Self {
        match spec {
            OwnershipSpec::SingleAccount(key) => Self::SingleAccount(key),
            OwnershipSpec::AccountSet(keys) => Self::AccountSet(keys),
            OwnershipSpec::AllAccounts => Self::AllAccounts,
            OwnershipSpec::SharedVia {
                base_account,
                vpc_share,
            } => Self::shared_via(base_account, VpcSharing::new(vpc_share)),
        }
    }
}

impl fmt::Debug for OwnershipRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleAccount(key) => f.debug_tuple("SingleAccount").field(key).finish(),
            Self::AccountSet(keys) => f.debug_tuple("AccountSet").field(keys).finish(),
            Self::AllAccounts => f.write_str("AllAccounts"),
            Self::SharedVia { base_account, .. } => f
                .debug_struct("SharedVia")
                .field("base_account", base_account)
                .finish_non_exhaustive(),
        }
    }
}

/// Output of lenient resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved targets in stable order.
    pub targets: BTreeSet<Target>,
    /// One warning per skipped unknown account.
    pub warnings: Vec<Warning>,
}

/// Predicate dropping targets from a resolution.
pub type TargetFilter<'a> = &'a (dyn Fn(&Target) -> bool + Send + Sync);

/// Computes deployment targets from ownership rules.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    directory: Arc<AccountDirectory>,
    home_region: AwsRegion,
}

impl TargetResolver {
    /// Create a resolver over a directory snapshot.
    #[must_use]
    pub fn new(directory: Arc<AccountDirectory>, home_region: AwsRegion) -> Self {
        Self {
            directory,
            home_region,
        }
    }

    /// The directory this resolver reads.
    #[must_use]
    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    /// Resolve a rule strictly: any unknown account key fails the call with
    /// `UnknownAccount`.
    pub fn resolve(
        &self,
        rule: &OwnershipRule,
        regions: &[AwsRegion],
        exclude: Option<TargetFilter<'_>>,
    ) -> Result<BTreeSet<Target>, LzError> {
        let keys = self.account_keys(rule)?;
        if let Some(unknown) = keys.iter().find(|k| !self.directory.contains(k)) {
            return Err(LzError::unknown_account(unknown));
        }
        Ok(self.expand(keys, regions, exclude))
    }

    /// Resolve a rule, dropping unknown account keys with a warning instead
    /// of failing.
    #[must_use]
    pub fn resolve_lenient(
        &self,
        rule: &OwnershipRule,
        regions: &[AwsRegion],
        exclude: Option<TargetFilter<'_>>,
    ) -> Resolution {
        let mut warnings = Vec::new();
        let keys = match self.account_keys(rule) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "ownership rule could not be expanded");
                if let OwnershipRule::SharedVia { base_account, .. } = rule {
                    warnings.push(Warning::for_account(base_account.clone(), e.message));
                }
                return Resolution {
                    targets: BTreeSet::new(),
                    warnings,
                };
            }
        };

        let (known, unknown): (BTreeSet<String>, BTreeSet<String>) =
            keys.into_iter().partition(|k| self.directory.contains(k));
        for key in unknown {
            warn!(account_key = %key, "skipping account missing from the directory");
            warnings.push(Warning::for_account(
                key.clone(),
                LzError::unknown_account(&key).message,
            ));
        }

        Resolution {
            targets: self.expand(known, regions, exclude),
            warnings,
        }
    }

    /// Account keys the rule names, deduplicated. Fails only when a
    /// `SharedVia` base account is unknown, since its OU drives expansion.
    fn account_keys(&self, rule: &OwnershipRule) -> Result<BTreeSet<String>, LzError> {
        let keys = match rule {
            OwnershipRule::SingleAccount(key) => BTreeSet::from([key.clone()]),
            OwnershipRule::AccountSet(keys) => keys.iter().cloned().collect(),
            OwnershipRule::AllAccounts => self.directory.accounts().map(|a| a.key.clone()).collect(),
            OwnershipRule::SharedVia {
                base_account,
                predicate,
            } => {
                let base = self.directory.require(base_account)?;
                let accounts: Vec<Account> = self.directory.accounts().cloned().collect();
                let mut keys = BTreeSet::from([base.key.clone()]);
                keys.extend(predicate.consumers(&accounts, &base.organizational_unit_key));
                keys
            }
        };
        Ok(keys)
    }

    fn expand(
        &self,
        keys: BTreeSet<String>,
        regions: &[AwsRegion],
        exclude: Option<TargetFilter<'_>>,
    ) -> BTreeSet<Target> {
        let regions = self.normalize_regions(regions);
        let mut targets = BTreeSet::new();
        for key in &keys {
            for region in &regions {
                let target = Target::new(key.clone(), region.clone());
                if exclude.is_some_and(|f| f(&target)) {
                    debug!(target = %target, "target excluded");
                    continue;
                }
                targets.insert(target);
            }
        }
        targets
    }

    fn normalize_regions(&self, regions: &[AwsRegion]) -> BTreeSet<AwsRegion> {
        let normalized: BTreeSet<AwsRegion> = regions
            .iter()
            .map(|r| AwsRegion::or_home(Some(r.as_str()), &self.home_region))
            .collect();
        if normalized.is_empty() {
            BTreeSet::from([self.home_region.clone()])
        } else {
            normalized
        }
    }
}
