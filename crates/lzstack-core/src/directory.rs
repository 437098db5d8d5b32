//! Account inventory snapshot.
//!
//! [`AccountDirectory`] is loaded once per run from an [`AccountSource`] and
//! is read-only afterwards. Every other component looks accounts up here.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use lzstack_model::{Account, AccountId, LzError};

/// A persisted source of account records.
#[async_trait]
pub trait AccountSource: Send + Sync + std::fmt::Debug {
    /// Load every account record.
    async fn load(&self) -> Result<Vec<Account>, LzError>;
}

/// Accounts read from a JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileAccountSource {
    path: PathBuf,
}

impl JsonFileAccountSource {
    /// Create a source reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this source reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AccountSource for JsonFileAccountSource {
    async fn load(&self) -> Result<Vec<Account>, LzError> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            LzError::directory_load(format!(
                "failed to read account inventory {}",
                self.path.display()
            ))
            .with_source(e)
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            LzError::directory_load(format!(
                "failed to parse account inventory {}",
                self.path.display()
            ))
            .with_source(e)
        })
    }
}

/// Accounts held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticAccountSource {
    accounts: Vec<Account>,
}

impl StaticAccountSource {
    /// Create a source returning `accounts`.
    #[must_use]
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AccountSource for StaticAccountSource {
    async fn load(&self) -> Result<Vec<Account>, LzError> {
        Ok(self.accounts.clone())
    }
}

/// Immutable snapshot of the landing-zone accounts.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    accounts: BTreeMap<String, Account>,
    by_id: HashMap<AccountId, String>,
}

impl AccountDirectory {
    /// Build a directory from account records.
    ///
    /// # Errors
    /// Returns `DirectoryLoad` if two records share a key or an id.
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Result<Self, LzError> {
        let mut directory = Self::default();
        for account in accounts {
            if directory.accounts.contains_key(&account.key) {
                return Err(LzError::directory_load(format!(
                    "duplicate account key '{}'",
                    account.key
                )));
            }
            if let Some(existing) = directory.by_id.get(&account.id) {
                return Err(LzError::directory_load(format!(
                    "account id {} is used by both '{existing}' and '{}'",
                    account.id, account.key
                )));
            }
            if !account.id.is_aws_format() {
                warn!(account_key = %account.key, account_id = %account.id, "account id is not a 12-digit AWS account id");
            }
            directory
                .by_id
                .insert(account.id.clone(), account.key.clone());
            directory.accounts.insert(account.key.clone(), account);
        }
        Ok(directory)
    }

    /// Load a directory from a source.
    pub async fn load(source: &dyn AccountSource) -> Result<Self, LzError> {
        let accounts = source.load().await?;
        let directory = Self::from_accounts(accounts)?;
        debug!(accounts = directory.len(), "loaded account directory");
        Ok(directory)
    }

    /// Look up an account by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Account> {
        self.accounts.get(key)
    }

    /// Look up an account by key, failing with `UnknownAccount`.
    pub fn require(&self, key: &str) -> Result<&Account, LzError> {
        self.get(key).ok_or_else(|| LzError::unknown_account(key))
    }

    /// Look up an account by physical id.
    #[must_use]
    pub fn by_id(&self, id: &AccountId) -> Option<&Account> {
        self.by_id.get(id).and_then(|key| self.accounts.get(key))
    }

    /// Whether the key is known.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.accounts.contains_key(key)
    }

    /// All accounts, sorted by key.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Keys of the accounts in an organizational unit, sorted.
    #[must_use]
    pub fn keys_in_ou(&self, ou_key: &str) -> Vec<String> {
        ou_member_keys(self.accounts.values(), ou_key)
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Keys of the accounts in `ou_key`, in iteration order.
#[must_use]
pub fn ou_member_keys<'a>(
    accounts: impl IntoIterator<Item = &'a Account>,
    ou_key: &str,
) -> Vec<String> {
    accounts
        .into_iter()
        .filter(|a| a.organizational_unit_key == ou_key)
        .map(|a| a.key.clone())
        .collect()
}
