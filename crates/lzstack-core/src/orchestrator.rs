//! Batch deployment over resolved targets.
//!
//! The [`Orchestrator`] resolves an ownership rule, fans the per-target
//! upserts out with bounded concurrency and folds the outcomes into a
//! [`BatchReport`]. A failing target is recorded and never stops its
//! siblings. The template is shared by every target, so it is resolved once
//! up front and a resolution failure fails the whole batch.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use lzstack_model::{
    AwsRegion, BatchReport, Exclusion, LzError, ResourceRef, Target, TargetFailure, TemplateRef,
    UpsertRequest, UpsertResult, Warning,
};

use crate::allocator::SharedKeyAllocator;
use crate::config::LzConfig;
use crate::credentials::{CredentialBroker, TrustProvider};
use crate::directory::AccountDirectory;
use crate::engine::StackUpsertEngine;
use crate::provider::StackProvider;
use crate::registry::StackRegistry;
use crate::resolver::{OwnershipRule, Resolution, TargetResolver};
use crate::template::{TemplateStore, resolve_template};

/// One stack deployed to every target of a rule.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Deployment {
    /// Which accounts receive the stack.
    pub rule: OwnershipRule,
    /// Regions; empty means the home region.
    #[builder(default)]
    pub regions: Vec<AwsRegion>,
    /// Stack name.
    #[builder(setter(into))]
    pub stack_name: String,
    /// Template, inline or by location.
    pub template: TemplateRef,
    /// Stack parameters.
    #[builder(default)]
    pub parameters: BTreeMap<String, String>,
    /// Acknowledged capabilities.
    #[builder(default)]
    pub capabilities: BTreeSet<String>,
    /// Role override for foreign accounts.
    #[builder(default, setter(strip_option, into))]
    pub role_name: Option<String>,
    /// Targets to report as skipped.
    #[builder(default, setter(strip_option))]
    pub exclusion: Option<Exclusion>,
}

impl Deployment {
    fn request_for(&self, target: Target, template: &TemplateRef) -> UpsertRequest {
        UpsertRequest {
            target,
            stack_name: self.stack_name.clone(),
            template: template.clone(),
            parameters: self.parameters.clone(),
            capabilities: self.capabilities.clone(),
            role_name: self.role_name.clone(),
            exclusion: self.exclusion.clone(),
        }
    }
}

/// A shared resource provisioned at most once per target.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SharedResource {
    /// Resource kind, the allocation key together with the target.
    #[builder(setter(into))]
    pub kind: String,
    /// Which accounts need the resource.
    pub rule: OwnershipRule,
    /// Regions; empty means the home region.
    #[builder(default)]
    pub regions: Vec<AwsRegion>,
    /// Stack that provisions the resource.
    #[builder(setter(into))]
    pub stack_name: String,
    /// Template of that stack.
    pub template: TemplateRef,
    /// Stack parameters.
    #[builder(default)]
    pub parameters: BTreeMap<String, String>,
    /// Acknowledged capabilities.
    #[builder(default)]
    pub capabilities: BTreeSet<String>,
    /// Role override for foreign accounts.
    #[builder(default, setter(strip_option, into))]
    pub role_name: Option<String>,
    /// Stack output holding the resource's physical id; the stack id is
    /// used when unset or missing.
    #[builder(default, setter(strip_option, into))]
    pub physical_id_output: Option<String>,
}

impl SharedResource {
    fn request_for(&self, target: Target, template: &TemplateRef) -> UpsertRequest {
        UpsertRequest {
            target,
            stack_name: self.stack_name.clone(),
            template: template.clone(),
            parameters: self.parameters.clone(),
            capabilities: self.capabilities.clone(),
            role_name: self.role_name.clone(),
            exclusion: None,
        }
    }

    fn resource_ref(&self, result: &UpsertResult) -> Result<ResourceRef, LzError> {
        let physical_id = self
            .physical_id_output
            .as_ref()
            .and_then(|name| result.outputs.get(name).cloned())
            .or_else(|| result.stack_id.clone())
            .ok_or_else(|| {
                LzError::provider(format!(
                    "no physical id reported for {} on {}",
                    self.kind, result.target
                ))
            })?;
        Ok(ResourceRef {
            kind: self.kind.clone(),
            target: result.target.clone(),
            physical_id,
        })
    }
}

/// Batch layer over resolution, upserts and shared allocation.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    resolver: TargetResolver,
    engine: StackUpsertEngine,
    templates: Arc<dyn TemplateStore>,
    allocator: Arc<SharedKeyAllocator>,
    max_concurrency: usize,
}

impl Orchestrator {
    /// Wire the components for one run.
    #[must_use]
    pub fn new(
        config: &LzConfig,
        directory: Arc<AccountDirectory>,
        trust: Arc<dyn TrustProvider>,
        templates: Arc<dyn TemplateStore>,
        provider: Arc<dyn StackProvider>,
    ) -> Self {
        let retry = config.retry_policy();
        let registry = Arc::new(StackRegistry::new(
            config.home_region.clone(),
            config.stack_name_prefix.clone(),
        ));
        let broker = CredentialBroker::new(trust, config.home_account_id.clone(), retry);
        let engine = StackUpsertEngine::builder()
            .directory(Arc::clone(&directory))
            .registry(registry)
            .broker(broker)
            .templates(Arc::clone(&templates))
            .provider(provider)
            .retry(retry)
            .wait(config.wait_policy())
            .default_role_name(config.assume_role_name.clone())
            .build();

        Self {
            resolver: TargetResolver::new(directory, config.home_region.clone()),
            engine,
            templates,
            allocator: Arc::new(SharedKeyAllocator::new()),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// The target resolver.
    #[must_use]
    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    /// The upsert engine.
    #[must_use]
    pub fn engine(&self) -> &StackUpsertEngine {
        &self.engine
    }

    /// The run's stack registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<StackRegistry> {
        self.engine.registry()
    }

    /// The run's shared-resource allocator.
    #[must_use]
    pub fn allocator(&self) -> &Arc<SharedKeyAllocator> {
        &self.allocator
    }

    /// Upsert the deployment's stack on every resolved target.
    ///
    /// Fails with `TemplateNotFound` before any target is touched when the
    /// template cannot be resolved.
    pub async fn deploy(
        &self,
        deployment: &Deployment,
    ) -> Result<BatchReport<UpsertResult>, LzError> {
        let template = &self.shared_template(&deployment.template).await?;
        let Resolution { targets, warnings } =
            self.resolver
                .resolve_lenient(&deployment.rule, &deployment.regions, None);
        info!(
            stack_name = %deployment.stack_name,
            targets = targets.len(),
            "deploying stack"
        );

        let results: Vec<(Target, Result<UpsertResult, LzError>)> = stream::iter(targets)
            .map(|target| async move {
                let request = deployment.request_for(target.clone(), template);
                let result = self.engine.upsert(&request).await;
                (target, result)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        Ok(into_report(results, warnings))
    }

    /// Provision a shared resource on every resolved target that does not
    /// have it yet in this run.
    ///
    /// Like [`Orchestrator::deploy`], an unresolvable template fails the
    /// whole call.
    pub async fn ensure_shared(
        &self,
        resource: &SharedResource,
    ) -> Result<BatchReport<ResourceRef>, LzError> {
        let template = &self.shared_template(&resource.template).await?;
        let Resolution { targets, warnings } =
            self.resolver
                .resolve_lenient(&resource.rule, &resource.regions, None);
        info!(
            kind = %resource.kind,
            targets = targets.len(),
            "ensuring shared resource"
        );

        let results: Vec<(Target, Result<ResourceRef, LzError>)> = stream::iter(targets)
            .map(|target| async move {
                let result = self
                    .allocator
                    .ensure(&target, &resource.kind, || async {
                        let upserted = self
                            .engine
                            .upsert(&resource.request_for(target.clone(), template))
                            .await?;
                        resource.resource_ref(&upserted)
                    })
                    .await;
                (target, result)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        Ok(into_report(results, warnings))
    }

    async fn shared_template(&self, template: &TemplateRef) -> Result<TemplateRef, LzError> {
        let body = resolve_template(self.templates.as_ref(), template)
            .await
            .inspect_err(|e| warn!(error = %e, "shared template could not be resolved"))?;
        Ok(TemplateRef::Inline(body))
    }
}

fn into_report<T>(
    mut results: Vec<(Target, Result<T, LzError>)>,
    warnings: Vec<Warning>,
) -> BatchReport<T> {
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut report = BatchReport {
        warnings,
        ..BatchReport::default()
    };
    for (target, result) in results {
        match result {
            Ok(value) => report.succeeded.push(value),
            Err(e) => {
                warn!(target = %target, kind = %e.kind, error = %e, "target failed");
                report.failed.push(TargetFailure::from_error(target, &e));
            }
        }
    }
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        warnings = report.warnings.len(),
        "batch finished"
    );
    report
}
