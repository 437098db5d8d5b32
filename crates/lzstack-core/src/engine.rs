//! Idempotent create-or-update of one stack on one target.

use std::sync::Arc;

use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use lzstack_model::{
    AccountId, AwsRegion, ErrorKind, LzError, UpsertOutcome, UpsertRequest, UpsertResult,
};

use crate::config::{LzConfig, WaitPolicy};
use crate::credentials::{CredentialBroker, CredentialSource};
use crate::directory::AccountDirectory;
use crate::provider::{ProviderSession, StackDescription, StackProvider, StackSpec, UpdateOutcome};
use crate::registry::StackRegistry;
use crate::retry::RetryPolicy;
use crate::template::{TemplateStore, resolve_template};

/// Drives a stack on a target to the requested definition.
///
/// Mutations of one target are serialized through the registry handle's
/// upsert lock; different targets proceed independently.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StackUpsertEngine {
    directory: Arc<AccountDirectory>,
    registry: Arc<StackRegistry>,
    broker: CredentialBroker,
    templates: Arc<dyn TemplateStore>,
    provider: Arc<dyn StackProvider>,
    #[builder(default = LzConfig::default().retry_policy())]
    retry: RetryPolicy,
    #[builder(default)]
    wait: WaitPolicy,
    /// Role assumed in foreign accounts when the request names none.
    #[builder(default)]
    default_role_name: Option<String>,
}

/// A mutation accepted by the provider.
struct Submitted {
    session: ProviderSession,
    stack_id: String,
    outcome: UpsertOutcome,
    /// Set when nothing was started and the described stack is final.
    settled: Option<StackDescription>,
}

impl StackUpsertEngine {
    /// The registry handles are taken from.
    #[must_use]
    pub fn registry(&self) -> &Arc<StackRegistry> {
        &self.registry
    }

    /// The directory accounts are looked up in.
    #[must_use]
    pub fn directory(&self) -> &Arc<AccountDirectory> {
        &self.directory
    }

    /// Create or update the requested stack.
    ///
    /// Excluded targets return [`UpsertOutcome::Skipped`] without touching
    /// the trust or stack providers. Re-running an identical request against
    /// a settled stack returns [`UpsertOutcome::Unchanged`].
    pub async fn upsert(&self, request: &UpsertRequest) -> Result<UpsertResult, LzError> {
        let target = self.registry.target(
            &request.target.account_key,
            Some(request.target.region.as_str()),
        );
        let account = self.directory.require(&target.account_key)?;

        if request
            .exclusion
            .as_ref()
            .is_some_and(|e| e.excludes(&account.id, &target.region))
        {
            info!(target = %target, stack_name = %request.stack_name, "target excluded, skipping upsert");
            return Ok(UpsertResult::skipped(target));
        }

        let template_body = resolve_template(self.templates.as_ref(), &request.template).await?;
        let spec = StackSpec {
            name: request.stack_name.clone(),
            template_body,
            parameters: request.parameters.clone(),
            capabilities: request.capabilities.clone(),
        };
        let role_name = request
            .role_name
            .as_deref()
            .or(self.default_role_name.as_deref());
        let source = self.broker.source_for(&account.id, role_name);

        let handle = self.registry.get_or_create(&target);
        let _guard = handle.lock().await;
        handle.mark_pending();

        match self.apply(&account.id, &target.region, &source, &spec).await {
            Ok((outcome, description)) => {
                handle.mark_created(description.stack_id.clone());
                info!(
                    target = %target,
                    stack_name = %spec.name,
                    stack_id = %description.stack_id,
                    outcome = %outcome,
                    "stack upserted"
                );
                Ok(UpsertResult {
                    target,
                    stack_id: Some(description.stack_id),
                    outcome,
                    outputs: description.outputs,
                })
            }
            Err(e) => {
                handle.mark_settled();
                warn!(target = %target, stack_name = %spec.name, error = %e, "stack upsert failed");
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        account_id: &AccountId,
        region: &AwsRegion,
        source: &CredentialSource,
        spec: &StackSpec,
    ) -> Result<(UpsertOutcome, StackDescription), LzError> {
        let submitted = self
            .retry
            .run("upsert_stack", move || {
                self.submit(account_id, region, source, spec)
            })
            .await?;

        let Submitted {
            mut session,
            stack_id,
            outcome,
            settled,
        } = submitted;
        if let Some(description) = settled {
            return Ok((outcome, description));
        }

        let description = self
            .wait_for_terminal(&mut session, source, &spec.name, &stack_id)
            .await?;
        if description.status.is_failed() {
            return Err(LzError::stack_failed(format!(
                "stack {stack_id} finished in {}",
                description.status
            )));
        }
        Ok((outcome, description))
    }

    /// One attempt: fresh credentials, describe, then create or update.
    async fn submit(
        &self,
        account_id: &AccountId,
        region: &AwsRegion,
        source: &CredentialSource,
        spec: &StackSpec,
    ) -> Result<Submitted, LzError> {
        let session = ProviderSession {
            account_id: account_id.clone(),
            region: region.clone(),
            credentials: self.broker.resolve_once(source).await?,
        };

        let Some(existing) = self.provider.describe(&session, &spec.name).await? else {
            let stack_id = self.provider.create(&session, spec).await?;
            return Ok(Submitted {
                session,
                stack_id,
                outcome: UpsertOutcome::Created,
                settled: None,
            });
        };

        if existing.status.is_in_progress() {
            return Err(LzError::concurrent_conflict(format!(
                "stack {} is in {} state",
                existing.stack_id, existing.status
            )));
        }
        if existing.status.needs_replacement() {
            return Err(LzError::stack_failed(format!(
                "stack {} is in {} state and must be deleted before it can be recreated",
                existing.stack_id, existing.status
            )));
        }

        match self
            .provider
            .update(&session, &existing.stack_id, spec)
            .await?
        {
            UpdateOutcome::Updated => Ok(Submitted {
                session,
                stack_id: existing.stack_id,
                outcome: UpsertOutcome::Updated,
                settled: None,
            }),
            UpdateOutcome::NoChange => Ok(Submitted {
                session,
                stack_id: existing.stack_id.clone(),
                outcome: UpsertOutcome::Unchanged,
                settled: Some(existing),
            }),
        }
    }

    async fn wait_for_terminal(
        &self,
        session: &mut ProviderSession,
        source: &CredentialSource,
        stack_name: &str,
        stack_id: &str,
    ) -> Result<StackDescription, LzError> {
        let poll = async {
            loop {
                match self.provider.describe(session, stack_name).await {
                    Ok(Some(description)) if description.status.is_terminal() => {
                        return Ok(description);
                    }
                    Ok(Some(description)) => {
                        debug!(stack_id, status = %description.status, "waiting for stack to settle");
                    }
                    Ok(None) => {
                        return Err(LzError::stack_failed(format!(
                            "stack {stack_id} disappeared while waiting"
                        )));
                    }
                    Err(e) if e.kind == ErrorKind::AssumeRoleExpired => {
                        debug!(stack_id, "credentials expired while waiting, refreshing");
                        session.credentials = self.broker.resolve(source).await?;
                        continue;
                    }
                    Err(e) if e.is_transient() => {
                        warn!(stack_id, error = %e, "transient failure while waiting");
                    }
                    Err(e) => return Err(e),
                }
                tokio::time::sleep(self.wait.poll_interval).await;
            }
        };

        tokio::time::timeout(self.wait.timeout, poll)
            .await
            .map_err(|_| {
                LzError::upsert_timed_out(format!(
                    "stack {stack_id} did not settle within {}s",
                    self.wait.timeout.as_secs_f64()
                ))
            })?
    }
}
