//! Mapping from AWS SDK errors to [`LzError`].

use std::fmt;

use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use lzstack_model::{ErrorKind, LzError};

/// Classify an AWS error code.
#[must_use]
pub fn classify(code: Option<&str>) -> ErrorKind {
    match code {
        Some(
            "Throttling"
            | "ThrottlingException"
            | "TooManyRequestsException"
            | "RequestLimitExceeded"
            | "SlowDown",
        ) => ErrorKind::Throttled,
        Some("ExpiredToken" | "ExpiredTokenException" | "RequestExpired") => {
            ErrorKind::AssumeRoleExpired
        }
        _ => ErrorKind::Provider,
    }
}

/// Convert an SDK error, keeping it as the source.
pub(crate) fn from_sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> LzError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    let kind = classify(err.code());
    from_sdk_error_as(kind, operation, err)
}

/// Convert an SDK error into a given kind.
pub(crate) fn from_sdk_error_as<E, R>(kind: ErrorKind, operation: &str, err: SdkError<E, R>) -> LzError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    let message = format!("{operation} failed: {}", DisplayErrorContext(&err));
    LzError::new(kind, message).with_source(err)
}
