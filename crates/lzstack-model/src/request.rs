//! Upsert and invocation request types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, AwsRegion, Target};

/// Where a template body is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TemplateLocation {
    /// A local file.
    File {
        /// Path to the template file.
        path: PathBuf,
    },
    /// An object in an S3 bucket.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
}

impl TemplateLocation {
    /// Parse a location from `s3://bucket/key` or a plain path.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        if let Some(rest) = location.strip_prefix("s3://") {
            if let Some((bucket, key)) = rest.split_once('/') {
                return Self::S3 {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                };
            }
        }
        Self::File {
            path: PathBuf::from(location),
        }
    }
}

impl fmt::Display for TemplateLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path } => write!(f, "{}", path.display()),
            Self::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
        }
    }
}

/// A template given either inline or by location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateRef {
    /// The template body itself.
    Inline(String),
    /// A reference resolved through a template store before submission.
    Location(TemplateLocation),
}

/// "Deploy everywhere except" filter.
///
/// A pair is excluded only when the account matches and, if a region is
/// given, the region matches too. A region alone excludes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exclusion {
    /// Account to skip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_account_id: Option<AccountId>,
    /// Region the account skip is limited to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_region: Option<AwsRegion>,
}

impl Exclusion {
    /// Exclude an account in every region.
    #[must_use]
    pub fn account(account_id: AccountId) -> Self {
        Self {
            ignore_account_id: Some(account_id),
            ignore_region: None,
        }
    }

    /// Limit the exclusion to one region.
    #[must_use]
    pub fn in_region(mut self, region: impl Into<AwsRegion>) -> Self {
        self.ignore_region = Some(region.into());
        self
    }

    /// Whether this exclusion can ever match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ignore_account_id.is_none()
    }

    /// Whether the (account, region) pair is excluded.
    #[must_use]
    pub fn excludes(&self, account_id: &AccountId, region: &AwsRegion) -> bool {
        let Some(ignored) = &self.ignore_account_id else {
            return false;
        };
        ignored == account_id && self.ignore_region.as_ref().is_none_or(|r| r == region)
    }
}

/// A single idempotent create-or-update against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    /// Where the stack lives.
    pub target: Target,
    /// Deployment unit name.
    pub stack_name: String,
    /// Template to deploy.
    pub template: TemplateRef,
    /// Named stack parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Acknowledged capabilities, e.g. `CAPABILITY_NAMED_IAM`.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Role assumed in foreign accounts; overrides the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    /// Pre-flight exclusion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusion: Option<Exclusion>,
}

impl UpsertRequest {
    /// Create a request with no parameters or capabilities.
    #[must_use]
    pub fn new(target: Target, stack_name: impl Into<String>, template: TemplateRef) -> Self {
        Self {
            target,
            stack_name: stack_name.into(),
            template,
            parameters: BTreeMap::new(),
            capabilities: BTreeSet::new(),
            role_name: None,
            exclusion: None,
        }
    }

    /// Add a parameter, replacing any previous value for the key.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Add an acknowledged capability.
    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Override the assumed role.
    #[must_use]
    pub fn with_role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }

    /// Attach a pre-flight exclusion.
    #[must_use]
    pub fn with_exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusion = Some(exclusion);
        self
    }
}

/// VPC sharing configuration used to expand ownership to consumer accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcShareSpec {
    /// Share to every account in the owning account's organizational unit.
    #[serde(default)]
    pub share_to_ou_accounts: bool,
    /// Share to these account keys.
    #[serde(default)]
    pub share_to_specific_accounts: Vec<String>,
}

/// Serializable form of an ownership rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OwnershipSpec {
    /// One account.
    SingleAccount(String),
    /// A named set of accounts.
    AccountSet(Vec<String>),
    /// Every account in the directory.
    AllAccounts,
    /// An account plus the accounts its VPC is shared to.
    #[serde(rename_all = "camelCase")]
    SharedVia {
        /// Owning account key.
        base_account: String,
        /// Sharing configuration.
        #[serde(default)]
        vpc_share: VpcShareSpec,
    },
}

/// Request accepted by the invocation entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    /// Stack name.
    pub stack_name: String,
    /// Acknowledged capabilities.
    #[serde(default)]
    pub stack_capabilities: BTreeSet<String>,
    /// Stack parameters.
    #[serde(default)]
    pub stack_parameters: BTreeMap<String, String>,
    /// Template location.
    pub stack_template: TemplateLocation,
    /// Target account id; defaults to the home account.
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// Role to assume in the target account.
    #[serde(default)]
    pub assume_role_name: Option<String>,
    /// Target region; defaults to the home region.
    #[serde(default)]
    pub region: Option<String>,
    /// Account to skip.
    #[serde(default)]
    pub ignore_account_id: Option<AccountId>,
    /// Region the account skip is limited to.
    #[serde(default)]
    pub ignore_region: Option<String>,
    /// Explicit ownership rule; takes precedence over `account_id`.
    #[serde(default)]
    pub ownership: Option<OwnershipSpec>,
    /// Regions used with `ownership`; empty means `region` or the home region.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Path to the account directory JSON.
    pub accounts_source: PathBuf,
}

impl InvocationRequest {
    /// The exclusion described by the ignore fields, if any.
    #[must_use]
    pub fn exclusion(&self) -> Option<Exclusion> {
        self.ignore_account_id.as_ref().map(|id| Exclusion {
            ignore_account_id: Some(id.clone()),
            ignore_region: self.ignore_region.as_deref().map(AwsRegion::new),
        })
    }
}
