//! Orchestration configuration.
//!
//! Provides [`LzConfig`], loaded from environment variables with defaults
//! suitable for a single home account in `us-east-1`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use lzstack_model::{AccountId, AwsRegion};

use crate::retry::RetryPolicy;

/// Which provider family the deploy binary wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Real AWS (STS, CloudFormation, S3).
    #[default]
    Aws,
    /// In-memory providers, for dry runs.
    Memory,
}

/// Orchestration configuration.
///
/// # Examples
///
/// ```
/// use lzstack_core::config::LzConfig;
///
/// let config = LzConfig::default();
/// assert_eq!(config.home_region.as_str(), "us-east-1");
/// assert_eq!(config.max_concurrency, 8);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct LzConfig {
    /// The account the orchestrator runs in; upserts here use ambient identity.
    #[builder(default)]
    pub home_account_id: AccountId,

    /// Region used when a target omits one.
    #[builder(default)]
    pub home_region: AwsRegion,

    /// Role assumed in foreign accounts unless a request overrides it.
    #[builder(default = Some(String::from("OrganizationAccountAccessRole")))]
    pub assume_role_name: Option<String>,

    /// Prefix for stack handle names.
    #[builder(default = String::from("LZ"))]
    pub stack_name_prefix: String,

    /// Upper bound on waiting for a stack to settle, in seconds.
    #[builder(default = 3600)]
    pub upsert_timeout_secs: u64,

    /// Interval between stack status polls, in milliseconds.
    #[builder(default = 5000)]
    pub poll_interval_ms: u64,

    /// Attempts for transient failures, including the first.
    #[builder(default = 5)]
    pub retry_max_attempts: u32,

    /// First retry delay, in milliseconds.
    #[builder(default = 1000)]
    pub retry_initial_backoff_ms: u64,

    /// Retry delay cap, in milliseconds.
    #[builder(default = 30_000)]
    pub retry_max_backoff_ms: u64,

    /// Maximum targets processed concurrently.
    #[builder(default = 8)]
    pub max_concurrency: usize,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Provider family.
    #[builder(default)]
    pub provider: ProviderKind,

    /// Endpoint override for the AWS clients, e.g. a local emulator.
    #[builder(default)]
    pub endpoint_url: Option<String>,
}

impl Default for LzConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl LzConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LZ_HOME_ACCOUNT_ID` | `000000000000` |
    /// | `LZ_HOME_REGION` (or `DEFAULT_REGION`) | `us-east-1` |
    /// | `LZ_ASSUME_ROLE_NAME` (empty disables delegation) | `OrganizationAccountAccessRole` |
    /// | `LZ_STACK_NAME_PREFIX` | `LZ` |
    /// | `LZ_UPSERT_TIMEOUT_SECS` | `3600` |
    /// | `LZ_POLL_INTERVAL_MS` | `5000` |
    /// | `LZ_RETRY_MAX_ATTEMPTS` | `5` |
    /// | `LZ_RETRY_INITIAL_BACKOFF_MS` | `1000` |
    /// | `LZ_RETRY_MAX_BACKOFF_MS` | `30000` |
    /// | `LZ_MAX_CONCURRENCY` | `8` |
    /// | `LOG_LEVEL` | `info` |
    /// | `LZ_PROVIDER` | `aws` |
    /// | `LZ_ENDPOINT_URL` | unset |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("LZ_HOME_ACCOUNT_ID") {
            if let Ok(id) = AccountId::new(v) {
                config.home_account_id = id;
            }
        }
        if let Ok(v) = std::env::var("LZ_HOME_REGION").or_else(|_| std::env::var("DEFAULT_REGION"))
        {
            config.home_region = AwsRegion::new(v);
        }
        if let Ok(v) = std::env::var("LZ_ASSUME_ROLE_NAME") {
            config.assume_role_name = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = std::env::var("LZ_STACK_NAME_PREFIX") {
            config.stack_name_prefix = v;
        }
        env_parse("LZ_UPSERT_TIMEOUT_SECS", &mut config.upsert_timeout_secs);
        env_parse("LZ_POLL_INTERVAL_MS", &mut config.poll_interval_ms);
        env_parse("LZ_RETRY_MAX_ATTEMPTS", &mut config.retry_max_attempts);
        env_parse(
            "LZ_RETRY_INITIAL_BACKOFF_MS",
            &mut config.retry_initial_backoff_ms,
        );
        env_parse("LZ_RETRY_MAX_BACKOFF_MS", &mut config.retry_max_backoff_ms);
        env_parse("LZ_MAX_CONCURRENCY", &mut config.max_concurrency);
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("LZ_PROVIDER") {
            config.provider = parse_provider(&v);
        }
        if let Ok(v) = std::env::var("LZ_ENDPOINT_URL") {
            config.endpoint_url = Some(v).filter(|v| !v.trim().is_empty());
        }

        config
    }

    /// Retry policy for transient failures.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_initial_backoff_ms),
            Duration::from_millis(self.retry_max_backoff_ms),
        )
    }

    /// Wait policy for stack settling.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            timeout: Duration::from_secs(self.upsert_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// Bounds on waiting for a stack to reach a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Give up after this long.
    pub timeout: Duration,
    /// Delay between status polls.
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        LzConfig::default().wait_policy()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(parsed) = v.trim().parse::<T>() {
            *slot = parsed;
        }
    }
}

fn parse_provider(value: &str) -> ProviderKind {
    if value.eq_ignore_ascii_case("memory") {
        ProviderKind::Memory
    } else {
        ProviderKind::Aws
    }
}
