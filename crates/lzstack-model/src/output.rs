//! Stack states, upsert outcomes and batch reports.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, LzError};
use crate::types::Target;

/// Lifecycle state of a stack handle as seen by this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StackState {
    /// No stack is known to exist yet.
    #[default]
    Missing,
    /// An upsert is in flight.
    Pending,
    /// The stack exists and reached a successful terminal state.
    Created,
}

/// Provider-reported stack status, following the CloudFormation status set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StackStatus {
    CreateInProgress,
    CreateFailed,
    CreateComplete,
    RollbackInProgress,
    RollbackFailed,
    RollbackComplete,
    DeleteInProgress,
    DeleteFailed,
    DeleteComplete,
    UpdateInProgress,
    UpdateCompleteCleanupInProgress,
    UpdateComplete,
    UpdateFailed,
    UpdateRollbackInProgress,
    UpdateRollbackFailed,
    UpdateRollbackCompleteCleanupInProgress,
    UpdateRollbackComplete,
    ReviewInProgress,
    ImportInProgress,
    ImportComplete,
    ImportRollbackInProgress,
    ImportRollbackFailed,
    ImportRollbackComplete,
    /// A status this crate does not know about.
    Other(String),
}

impl StackStatus {
    /// Returns the provider status string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateFailed => "CREATE_FAILED",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            Self::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            Self::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            Self::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            Self::ReviewInProgress => "REVIEW_IN_PROGRESS",
            Self::ImportInProgress => "IMPORT_IN_PROGRESS",
            Self::ImportComplete => "IMPORT_COMPLETE",
            Self::ImportRollbackInProgress => "IMPORT_ROLLBACK_IN_PROGRESS",
            Self::ImportRollbackFailed => "IMPORT_ROLLBACK_FAILED",
            Self::ImportRollbackComplete => "IMPORT_ROLLBACK_COMPLETE",
            Self::Other(s) => s,
        }
    }

    /// Whether a mutation is still running.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        match self {
            Self::Other(s) => s.ends_with("_IN_PROGRESS"),
            _ => self.as_str().ends_with("_IN_PROGRESS"),
        }
    }

    /// Whether the stack has settled.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_in_progress()
    }

    /// Whether the last mutation failed or was rolled back.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        let s = self.as_str();
        s.ends_with("_FAILED") || (s.contains("ROLLBACK") && s.ends_with("_COMPLETE"))
    }

    /// Whether the stack can no longer be updated in place and must be
    /// deleted out of band before it can be recreated.
    #[must_use]
    pub fn needs_replacement(&self) -> bool {
        matches!(
            self,
            Self::CreateFailed | Self::RollbackComplete | Self::RollbackFailed | Self::DeleteFailed
        )
    }
}

impl FromStr for StackStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_FAILED" => Self::CreateFailed,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "ROLLBACK_IN_PROGRESS" => Self::RollbackInProgress,
            "ROLLBACK_FAILED" => Self::RollbackFailed,
            "ROLLBACK_COMPLETE" => Self::RollbackComplete,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_FAILED" => Self::DeleteFailed,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "UPDATE_IN_PROGRESS" => Self::UpdateInProgress,
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => Self::UpdateCompleteCleanupInProgress,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "UPDATE_FAILED" => Self::UpdateFailed,
            "UPDATE_ROLLBACK_IN_PROGRESS" => Self::UpdateRollbackInProgress,
            "UPDATE_ROLLBACK_FAILED" => Self::UpdateRollbackFailed,
            "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS" => {
                Self::UpdateRollbackCompleteCleanupInProgress
            }
            "UPDATE_ROLLBACK_COMPLETE" => Self::UpdateRollbackComplete,
            "REVIEW_IN_PROGRESS" => Self::ReviewInProgress,
            "IMPORT_IN_PROGRESS" => Self::ImportInProgress,
            "IMPORT_COMPLETE" => Self::ImportComplete,
            "IMPORT_ROLLBACK_IN_PROGRESS" => Self::ImportRollbackInProgress,
            "IMPORT_ROLLBACK_FAILED" => Self::ImportRollbackFailed,
            "IMPORT_ROLLBACK_COMPLETE" => Self::ImportRollbackComplete,
            other => Self::Other(other.to_owned()),
        })
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpsertOutcome {
    /// A new stack was created.
    Created,
    /// An existing stack was updated in place.
    Updated,
    /// The existing stack already matched the request.
    Unchanged,
    /// The target was excluded; nothing was called.
    Skipped,
}

impl fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Unchanged => "Unchanged",
            Self::Skipped => "Skipped",
        };
        f.write_str(s)
    }
}

/// Result of one upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResult {
    /// Where the stack lives.
    pub target: Target,
    /// Provider stack id; `None` when skipped.
    pub stack_id: Option<String>,
    /// What happened.
    pub outcome: UpsertOutcome,
    /// Stack outputs reported by the provider.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
}

impl UpsertResult {
    /// A result for an excluded target.
    #[must_use]
    pub fn skipped(target: Target) -> Self {
        Self {
            target,
            stack_id: None,
            outcome: UpsertOutcome::Skipped,
            outputs: BTreeMap::new(),
        }
    }
}

/// Reference to a provisioned shared resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    /// Resource kind, e.g. `ebs-default-key`.
    pub kind: String,
    /// Where the resource lives.
    pub target: Target,
    /// Provider identifier (ARN, id or stack id).
    pub physical_id: String,
}

/// A failed target in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetFailure {
    /// The failed target.
    pub target: Target,
    /// Failure kind.
    pub kind: ErrorKind,
    /// Error message.
    pub message: String,
    /// Whether re-running the whole orchestration is safe.
    pub retry_safe: bool,
}

impl TargetFailure {
    /// Build a failure record from an error.
    #[must_use]
    pub fn from_error(target: Target, error: &LzError) -> Self {
        Self {
            target,
            kind: error.kind,
            message: error.message.clone(),
            retry_safe: error.kind.is_retry_safe(),
        }
    }
}

/// A non-fatal diagnostic collected during a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    /// Account the warning concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_key: Option<String>,
    /// Warning text.
    pub message: String,
}

impl Warning {
    /// Create a warning about an account.
    #[must_use]
    pub fn for_account(account_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            account_key: Some(account_key.into()),
            message: message.into(),
        }
    }
}

/// Per-target results of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport<T> {
    /// Successful targets.
    pub succeeded: Vec<T>,
    /// Failed targets.
    pub failed: Vec<TargetFailure>,
    /// Warnings, e.g. skipped unknown accounts.
    pub warnings: Vec<Warning>,
}

impl<T> BatchReport<T> {
    /// Whether every target succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether re-running the batch is safe for every failure.
    #[must_use]
    pub fn is_retry_safe(&self) -> bool {
        self.failed.iter().all(|f| f.retry_safe)
    }
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
