//! Cross-account credential delegation.
//!
//! The [`CredentialBroker`] decides between the orchestrator's ambient
//! identity and delegated role credentials, and acquires the latter through
//! a [`TrustProvider`]. Credentials are never cached: every upsert attempt
//! acquires a fresh set right before use.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use tracing::debug;

use lzstack_model::{AccountId, DelegatedCredentials, LzError};

use crate::retry::RetryPolicy;

/// Exchanges an account id and role name for delegated credentials.
#[async_trait]
pub trait TrustProvider: Send + Sync + fmt::Debug {
    /// Assume `role_name` in `account_id`.
    ///
    /// Fails with `AssumeRoleDenied` when the trust policy rejects the
    /// caller, or `AssumeRoleExpired`/`Throttled` for transient conditions.
    async fn assume_role(
        &self,
        account_id: &AccountId,
        role_name: &str,
    ) -> Result<DelegatedCredentials, LzError>;
}

/// Identity an operation runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// The orchestrator's own identity.
    Ambient,
    /// A role assumed in another account.
    Delegated {
        /// Target account.
        account_id: AccountId,
        /// Role to assume.
        role_name: String,
    },
}

/// Resolves credential sources to credentials.
#[derive(Debug, Clone)]
pub struct CredentialBroker {
    trust: Arc<dyn TrustProvider>,
    home_account_id: AccountId,
    retry: RetryPolicy,
}

impl CredentialBroker {
    /// Create a broker for an orchestrator running in `home_account_id`.
    #[must_use]
    pub fn new(trust: Arc<dyn TrustProvider>, home_account_id: AccountId, retry: RetryPolicy) -> Self {
        Self {
            trust,
            home_account_id,
            retry,
        }
    }

    /// The orchestrator's own account.
    #[must_use]
    pub fn home_account_id(&self) -> &AccountId {
        &self.home_account_id
    }

    /// Choose the credential source for an account.
    ///
    /// Delegation happens only for a foreign account with a role name.
    #[must_use]
    pub fn source_for(&self, account_id: &AccountId, role_name: Option<&str>) -> CredentialSource {
        match role_name.map(str::trim) {
            Some(role) if !role.is_empty() && account_id != &self.home_account_id => {
                CredentialSource::Delegated {
                    account_id: account_id.clone(),
                    role_name: role.to_owned(),
                }
            }
            _ => CredentialSource::Ambient,
        }
    }

    /// Acquire delegated credentials, retrying transient failures.
    pub async fn acquire(
        &self,
        account_id: &AccountId,
        role_name: &str,
    ) -> Result<DelegatedCredentials, LzError> {
        let trust = self.trust.as_ref();
        let credentials = self
            .retry
            .run("assume_role", move || trust.assume_role(account_id, role_name))
            .await?;
        debug!(account_id = %account_id, role_name, expiry = %credentials.expiry, "acquired delegated credentials");
        Ok(credentials)
    }

    /// Resolve a source; `None` means ambient identity.
    pub async fn resolve(
        &self,
        source: &CredentialSource,
    ) -> Result<Option<DelegatedCredentials>, LzError> {
        match source {
            CredentialSource::Ambient => Ok(None),
            CredentialSource::Delegated {
                account_id,
                role_name,
            } => self.acquire(account_id, role_name).await.map(Some),
        }
    }

    /// Resolve a source with a single trust call, for callers that run their
    /// own retry loop around it.
    pub async fn resolve_once(
        &self,
        source: &CredentialSource,
    ) -> Result<Option<DelegatedCredentials>, LzError> {
        match source {
            CredentialSource::Ambient => Ok(None),
            CredentialSource::Delegated {
                account_id,
                role_name,
            } => self.trust.assume_role(account_id, role_name).await.map(Some),
        }
    }
}

/// In-memory trust provider for tests and dry runs.
///
/// Issues synthetic one-hour credentials, rejects denied accounts and can
/// throttle a configurable number of calls.
#[derive(Debug, Default)]
pub struct StaticTrustProvider {
    denied: RwLock<HashSet<AccountId>>,
    throttle_remaining: AtomicUsize,
    calls: AtomicUsize,
}

impl StaticTrustProvider {
    /// Create a provider that trusts every account.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject role assumption into `account_id`.
    pub fn deny(&self, account_id: AccountId) {
        self.denied.write().insert(account_id);
    }

    /// Throttle the next `n` calls.
    pub fn throttle_next(&self, n: usize) {
        self.throttle_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of `assume_role` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrustProvider for StaticTrustProvider {
    async fn assume_role(
        &self,
        account_id: &AccountId,
        role_name: &str,
    ) -> Result<DelegatedCredentials, LzError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let throttled = self
            .throttle_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(LzError::throttled("Rate exceeded"));
        }
        if self.denied.read().contains(account_id) {
            return Err(LzError::assume_role_denied(format!(
                "not authorized to assume {role_name} in {account_id}"
            )));
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        Ok(DelegatedCredentials {
            access_key_id: format!("ASIA{}", &token[..16].to_ascii_uppercase()),
            secret_access_key: token.clone(),
            session_token: format!("{account_id}:{role_name}:{token}"),
            expiry: Utc::now() + Duration::hours(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use lzstack_model::ErrorKind;

    use super::*;

    fn id(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn broker(trust: Arc<StaticTrustProvider>) -> CredentialBroker {
        CredentialBroker::new(
            trust,
            id("111111111111"),
            RetryPolicy::new(3, StdDuration::from_millis(1), StdDuration::from_millis(2)),
        )
    }

    #[test]
    fn test_should_use_ambient_identity_for_home_account() {
        let broker = broker(Arc::new(StaticTrustProvider::new()));
        assert_eq!(
            broker.source_for(&id("111111111111"), Some("Admin")),
            CredentialSource::Ambient
        );
        assert_eq!(
            broker.source_for(&id("222222222222"), None),
            CredentialSource::Ambient
        );
        assert_eq!(
            broker.source_for(&id("222222222222"), Some(" ")),
            CredentialSource::Ambient
        );
        assert_eq!(
            broker.source_for(&id("222222222222"), Some("Admin")),
            CredentialSource::Delegated {
                account_id: id("222222222222"),
                role_name: "Admin".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn test_should_not_call_trust_provider_for_ambient() {
        let trust = Arc::new(StaticTrustProvider::new());
        let broker = broker(Arc::clone(&trust));
        assert!(broker.resolve(&CredentialSource::Ambient).await.unwrap().is_none());
        assert_eq!(trust.calls(), 0);
    }

    #[tokio::test]
    async fn test_should_acquire_fresh_credentials_each_time() {
        let trust = Arc::new(StaticTrustProvider::new());
        let broker = broker(Arc::clone(&trust));
        let a = broker.acquire(&id("222222222222"), "Admin").await.unwrap();
        let b = broker.acquire(&id("222222222222"), "Admin").await.unwrap();
        assert_ne!(a.session_token, b.session_token);
        assert!(!a.is_expired());
        assert_eq!(trust.calls(), 2);
    }

    #[tokio::test]
    async fn test_should_retry_throttled_assume_role() {
        let trust = Arc::new(StaticTrustProvider::new());
        trust.throttle_next(2);
        let broker = broker(Arc::clone(&trust));
        assert!(broker.acquire(&id("222222222222"), "Admin").await.is_ok());
        assert_eq!(trust.calls(), 3);
    }

    #[tokio::test]
    async fn test_should_escalate_persistent_throttling() {
        let trust = Arc::new(StaticTrustProvider::new());
        trust.throttle_next(10);
        let broker = broker(Arc::clone(&trust));
        let err = broker.acquire(&id("222222222222"), "Admin").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Throttled);
        assert_eq!(trust.calls(), 3);
    }

    #[tokio::test]
    async fn test_should_fail_fast_when_denied() {
        let trust = Arc::new(StaticTrustProvider::new());
        trust.deny(id("222222222222"));
        let broker = broker(Arc::clone(&trust));
        let err = broker.acquire(&id("222222222222"), "Admin").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AssumeRoleDenied);
        assert_eq!(trust.calls(), 1);
    }
}
