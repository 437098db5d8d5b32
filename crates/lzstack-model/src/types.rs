//! Addressing types shared across the orchestration layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LzError;

/// Physical account identifier.
///
/// Landing-zone inventories use 12-digit AWS account ids, but fixtures and
/// dry runs may use symbolic ids, so only emptiness is rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Account id used when no home account is configured.
    pub const DEFAULT: &str = "000000000000";

    /// Create a new account id.
    ///
    /// # Errors
    /// Returns `InvalidRequest` if the id is empty or whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, LzError> {
        let id = id.into().trim().to_owned();
        if id.is_empty() {
            return Err(LzError::invalid_request("account id must not be empty"));
        }
        Ok(Self(id))
    }

    /// Whether this id has the 12-digit AWS format.
    #[must_use]
    pub fn is_aws_format(&self) -> bool {
        self.0.len() == 12 && self.0.chars().all(|c| c.is_ascii_digit())
    }

    /// Get the account id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = LzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

/// AWS region identifier, normalized to trimmed lower case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Region used when nothing else is configured.
    pub const DEFAULT: &str = "us-east-1";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into().trim().to_ascii_lowercase())
    }

    /// Normalize an optional region, falling back to `home` when it is
    /// omitted or blank.
    #[must_use]
    pub fn or_home(region: Option<&str>, home: &AwsRegion) -> Self {
        match region.map(str::trim) {
            Some(r) if !r.is_empty() => Self::new(r),
            _ => home.clone(),
        }
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AwsRegion {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AwsRegion {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for AwsRegion {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<AwsRegion> for String {
    fn from(value: AwsRegion) -> Self {
        value.0
    }
}

/// The (account, region) address a stack is deployed into.
///
/// Ordering is by account key, then region; resolved target sets iterate in
/// this order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Logical account key.
    pub account_key: String,
    /// Deployment region.
    pub region: AwsRegion,
}

impl Target {
    /// Create a new target.
    #[must_use]
    pub fn new(account_key: impl Into<String>, region: impl Into<AwsRegion>) -> Self {
        Self {
            account_key: account_key.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_key, self.region)
    }
}
