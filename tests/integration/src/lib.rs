//! End-to-end tests for lzstack.
//!
//! Every test runs the full pipeline (resolution, credentials, upsert,
//! allocation) against the in-memory trust and stack providers, so no AWS
//! account is needed:
//!
//! ```text
//! cargo test -p lzstack-integration
//! ```

use std::sync::{Arc, Once};

use lzstack_core::{
    AccountDirectory, InMemoryStackProvider, LzConfig, Orchestrator, StaticTemplateStore,
    StaticTrustProvider,
};
use lzstack_model::{Account, AccountId};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Home account of every fixture.
pub const HOME_ACCOUNT: &str = "111111111111";

/// Parse a fixture account id.
#[must_use]
pub fn account_id(id: &str) -> AccountId {
    AccountId::new(id).unwrap()
}

/// The landing zone used across tests:
///
/// | key | id | OU |
/// |-----|----|----|
/// | `ops` | `111111111111` | `core` |
/// | `shared` | `222222222222` | `core` |
/// | `dev` | `333333333333` | `workloads` |
/// | `prod` | `444444444444` | `workloads` |
#[must_use]
pub fn landing_zone() -> Vec<Account> {
    vec![
        Account::new("ops", account_id(HOME_ACCOUNT), "core"),
        Account::new("shared", account_id("222222222222"), "core"),
        Account::new("dev", account_id("333333333333"), "workloads"),
        Account::new("prod", account_id("444444444444"), "workloads"),
    ]
}

/// Configuration with millisecond waits so tests finish quickly.
#[must_use]
pub fn fast_config() -> LzConfig {
    LzConfig::builder()
        .home_account_id(account_id(HOME_ACCOUNT))
        .upsert_timeout_secs(5)
        .poll_interval_ms(1)
        .retry_max_attempts(4)
        .retry_initial_backoff_ms(1)
        .retry_max_backoff_ms(5)
        .max_concurrency(4)
        .build()
}

/// An orchestrator wired to in-memory services, with handles on each
/// service for arranging and inspecting.
#[derive(Debug)]
pub struct Harness {
    /// The orchestrator under test.
    pub orchestrator: Orchestrator,
    /// Role assumption double.
    pub trust: Arc<StaticTrustProvider>,
    /// Stack service double.
    pub provider: Arc<InMemoryStackProvider>,
    /// Template bodies by location.
    pub templates: Arc<StaticTemplateStore>,
}

impl Harness {
    /// Harness over [`landing_zone`] with [`fast_config`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&fast_config())
    }

    /// Harness over [`landing_zone`] with a custom configuration.
    #[must_use]
    pub fn with_config(config: &LzConfig) -> Self {
        init_tracing();

        let trust = Arc::new(StaticTrustProvider::new());
        let provider = Arc::new(InMemoryStackProvider::new());
        let templates = Arc::new(StaticTemplateStore::new());
        let directory = Arc::new(AccountDirectory::from_accounts(landing_zone()).unwrap());
        let orchestrator = Orchestrator::new(
            config,
            directory,
            Arc::clone(&trust) as _,
            Arc::clone(&templates) as _,
            Arc::clone(&provider) as _,
        );
        Self {
            orchestrator,
            trust,
            provider,
            templates,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

mod test_failures;
mod test_invocation;
mod test_scenarios;
mod test_shared;
