//! STS-backed trust provider.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::error::ProvideErrorMetadata;
use chrono::{DateTime, Utc};
use tracing::debug;

use lzstack_core::TrustProvider;
use lzstack_model::{AccountId, DelegatedCredentials, ErrorKind, LzError};

use crate::error::{classify, from_sdk_error_as};

const SESSION_NAME: &str = "lzstack";

/// Assumes roles with `sts:AssumeRole` from the ambient identity.
#[derive(Debug, Clone)]
pub struct StsTrustProvider {
    client: aws_sdk_sts::Client,
}

impl StsTrustProvider {
    /// Create a provider from a loaded SDK config.
    #[must_use]
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(sdk_config),
        }
    }
}

/// ARN of `role_name` in `account_id`.
#[must_use]
pub fn role_arn(account_id: &AccountId, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}

fn classify_assume_role(code: Option<&str>) -> ErrorKind {
    match code {
        Some("AccessDenied" | "AccessDeniedException" | "RegionDisabledException") => {
            ErrorKind::AssumeRoleDenied
        }
        other => classify(other),
    }
}

#[async_trait]
impl TrustProvider for StsTrustProvider {
    async fn assume_role(
        &self,
        account_id: &AccountId,
        role_name: &str,
    ) -> Result<DelegatedCredentials, LzError> {
        let arn = role_arn(account_id, role_name);
        debug!(role_arn = %arn, "assuming role");

        let output = self
            .client
            .assume_role()
            .role_arn(&arn)
            .role_session_name(SESSION_NAME)
            .send()
            .await
            .map_err(|e| {
                let kind = classify_assume_role(e.code());
                from_sdk_error_as(kind, "AssumeRole", e)
            })?;

        let credentials = output
            .credentials()
            .ok_or_else(|| LzError::provider(format!("AssumeRole on {arn} returned no credentials")))?;
        let expiration = credentials.expiration();
        let expiry = DateTime::<Utc>::from_timestamp(expiration.secs(), expiration.subsec_nanos())
            .ok_or_else(|| LzError::provider(format!("AssumeRole on {arn} returned an invalid expiry")))?;

        Ok(DelegatedCredentials {
            access_key_id: credentials.access_key_id().to_owned(),
            secret_access_key: credentials.secret_access_key().to_owned(),
            session_token: credentials.session_token().to_owned(),
            expiry,
        })
    }
}
