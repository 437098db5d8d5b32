//! Error types for landing-zone orchestration.
//!
//! Every failure carries an [`ErrorKind`] so batch callers can decide, per
//! target, whether to retry, skip or abort the run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An ownership rule or request referenced an account key that is not in
    /// the directory.
    UnknownAccount,
    /// The template location could not be resolved to a body.
    TemplateNotFound,
    /// The target account's trust policy rejected the role assumption.
    AssumeRoleDenied,
    /// Delegated credentials expired before or during use.
    AssumeRoleExpired,
    /// The trust or deployment provider throttled the request.
    Throttled,
    /// A stack did not reach a terminal state within the wait timeout.
    UpsertTimedOut,
    /// A mutation is already in progress on the stack.
    ConcurrentUpsertConflict,
    /// The provider reported a failed terminal state for the stack.
    StackOperationFailed,
    /// The account directory could not be loaded.
    DirectoryLoad,
    /// The request is malformed.
    InvalidRequest,
    /// Any other provider failure.
    Provider,
    /// Configuration error.
    Config,
}

impl ErrorKind {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownAccount => "UnknownAccount",
            Self::TemplateNotFound => "TemplateNotFound",
            Self::AssumeRoleDenied => "AssumeRoleDenied",
            Self::AssumeRoleExpired => "AssumeRoleExpired",
            Self::Throttled => "Throttled",
            Self::UpsertTimedOut => "UpsertTimedOut",
            Self::ConcurrentUpsertConflict => "ConcurrentUpsertConflict",
            Self::StackOperationFailed => "StackOperationFailed",
            Self::DirectoryLoad => "DirectoryLoad",
            Self::InvalidRequest => "InvalidRequest",
            Self::Provider => "Provider",
            Self::Config => "Config",
        }
    }

    /// Whether the failure is transient and the operation may be retried
    /// with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AssumeRoleExpired | Self::Throttled | Self::ConcurrentUpsertConflict
        )
    }

    /// Whether re-running the whole orchestration is safe without an
    /// out-of-band fix.
    #[must_use]
    pub fn is_retry_safe(&self) -> bool {
        !matches!(self, Self::AssumeRoleDenied)
    }

    /// Whether the failure aborts the whole run rather than a single target.
    #[must_use]
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::DirectoryLoad | Self::TemplateNotFound | Self::Config)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An orchestration error.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct LzError {
    /// The failure kind.
    pub kind: ErrorKind,
    /// A human-readable message.
    pub message: String,
    /// The underlying source error, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl LzError {
    /// Create a new error with a custom message.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the error is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    // -- Convenience constructors --

    /// Unknown account key.
    #[must_use]
    pub fn unknown_account(account_key: &str) -> Self {
        Self::new(
            ErrorKind::UnknownAccount,
            format!("account '{account_key}' is not in the account directory"),
        )
    }

    /// Template resolution failure.
    #[must_use]
    pub fn template_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TemplateNotFound, message)
    }

    /// Role assumption rejected by the trust policy.
    #[must_use]
    pub fn assume_role_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AssumeRoleDenied, message)
    }

    /// Expired delegated credentials.
    #[must_use]
    pub fn assume_role_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AssumeRoleExpired, message)
    }

    /// Throttled request.
    #[must_use]
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Throttled, message)
    }

    /// Stack stuck in a non-terminal state.
    #[must_use]
    pub fn upsert_timed_out(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpsertTimedOut, message)
    }

    /// Mutation already in progress.
    #[must_use]
    pub fn concurrent_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConcurrentUpsertConflict, message)
    }

    /// Failed terminal stack state.
    #[must_use]
    pub fn stack_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StackOperationFailed, message)
    }

    /// Account directory load failure.
    #[must_use]
    pub fn directory_load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DirectoryLoad, message)
    }

    /// Malformed request.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Generic provider failure.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Provider, message)
    }

    /// Configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }
}

/// Convenience result type for orchestration operations.
pub type LzResult<T> = Result<T, LzError>;
