//! Invocation entry point.
//!
//! Turns an [`InvocationRequest`] into a [`Deployment`] and runs it. Only
//! setup failures (directory load, an unresolvable target account, a
//! missing template) surface as `Err`; per-target failures are reported in
//! the batch.

use std::sync::Arc;

use tracing::info;

use lzstack_model::{AwsRegion, BatchReport, InvocationRequest, LzError, TemplateRef, UpsertResult};

use crate::config::LzConfig;
use crate::credentials::TrustProvider;
use crate::directory::{AccountDirectory, JsonFileAccountSource};
use crate::orchestrator::{Deployment, Orchestrator};
use crate::provider::StackProvider;
use crate::resolver::OwnershipRule;
use crate::template::TemplateStore;

/// Services an invocation runs against.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Run configuration.
    pub config: LzConfig,
    /// Role assumption.
    pub trust: Arc<dyn TrustProvider>,
    /// Template bodies.
    pub templates: Arc<dyn TemplateStore>,
    /// Stack service.
    pub provider: Arc<dyn StackProvider>,
}

/// Handle one invocation request.
///
/// The target rule is the explicit `ownership` if given, else the account
/// whose id is `accountId`, else the home account.
pub async fn handle_invocation(
    request: &InvocationRequest,
    context: &InvocationContext,
) -> Result<BatchReport<UpsertResult>, LzError> {
    if request.stack_name.trim().is_empty() {
        return Err(LzError::invalid_request("stackName must not be empty"));
    }

    let source = JsonFileAccountSource::new(&request.accounts_source);
    let directory = Arc::new(AccountDirectory::load(&source).await?);
    let rule = select_rule(request, &directory, &context.config)?;
    let regions = select_regions(request, &context.config);
    info!(
        stack_name = %request.stack_name,
        rule = ?rule,
        regions = ?regions,
        "handling invocation"
    );

    let deployment = Deployment {
        rule,
        regions,
        stack_name: request.stack_name.clone(),
        template: TemplateRef::Location(request.stack_template.clone()),
        parameters: request.stack_parameters.clone(),
        capabilities: request.stack_capabilities.clone(),
        role_name: request
            .assume_role_name
            .clone()
            .filter(|r| !r.trim().is_empty()),
        exclusion: request.exclusion(),
    };

    let orchestrator = Orchestrator::new(
        &context.config,
        directory,
        Arc::clone(&context.trust),
        Arc::clone(&context.templates),
        Arc::clone(&context.provider),
    );
    orchestrator.deploy(&deployment).await
}

fn select_rule(
    request: &InvocationRequest,
    directory: &AccountDirectory,
    config: &LzConfig,
) -> Result<OwnershipRule, LzError> {
    if let Some(ownership) = &request.ownership {
        return Ok(ownership.clone().into());
    }
    let account_id = request
        .account_id
        .as_ref()
        .unwrap_or(&config.home_account_id);
    directory
        .by_id(account_id)
        .map(|account| OwnershipRule::SingleAccount(account.key.clone()))
        .ok_or_else(|| LzError::unknown_account(account_id.as_str()))
}

fn select_regions(request: &InvocationRequest, config: &LzConfig) -> Vec<AwsRegion> {
    if request.regions.is_empty() {
        vec![AwsRegion::or_home(request.region.as_deref(), &config.home_region)]
    } else {
        request.regions.iter().map(AwsRegion::new).collect()
    }
}
