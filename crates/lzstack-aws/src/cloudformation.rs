//! CloudFormation-backed stack provider.
//!
//! A client is built per call from the shared SDK config, overriding the
//! region and, for delegated sessions, the credentials.

use std::collections::BTreeMap;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::Credentials;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::config::Region;
use aws_sdk_cloudformation::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::{Capability, Parameter, Stack};
use tracing::debug;

use lzstack_core::{ProviderSession, StackDescription, StackProvider, StackSpec, UpdateOutcome};
use lzstack_model::{ErrorKind, LzError, StackStatus};

use crate::error::{from_sdk_error, from_sdk_error_as};

const CREDENTIALS_PROVIDER: &str = "lzstack-delegated";

/// Stack provider talking to AWS CloudFormation.
#[derive(Debug, Clone)]
pub struct CloudFormationStackProvider {
    sdk_config: SdkConfig,
}

impl CloudFormationStackProvider {
    /// Create a provider from a loaded SDK config.
    #[must_use]
    pub fn new(sdk_config: SdkConfig) -> Self {
        Self { sdk_config }
    }

    fn client(&self, session: &ProviderSession) -> Client {
        let mut builder = aws_sdk_cloudformation::config::Builder::from(&self.sdk_config)
            .region(Region::new(session.region.as_str().to_owned()));
        if let Some(credentials) = &session.credentials {
            builder = builder.credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                Some(credentials.session_token.clone()),
                Some(SystemTime::from(credentials.expiry)),
                CREDENTIALS_PROVIDER,
            ));
        }
        Client::from_conf(builder.build())
    }
}

fn parameters(spec: &StackSpec) -> Vec<Parameter> {
    spec.parameters
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

fn capabilities(spec: &StackSpec) -> Vec<Capability> {
    spec.capabilities
        .iter()
        .map(|c| Capability::from(c.as_str()))
        .collect()
}

fn describe_stack(stack: &Stack) -> Result<StackDescription, LzError> {
    let stack_id = stack
        .stack_id()
        .ok_or_else(|| LzError::provider("DescribeStacks returned a stack without an id"))?;
    let Ok(status) = stack.stack_status().as_str().parse::<StackStatus>();
    let outputs: BTreeMap<String, String> = stack
        .outputs()
        .iter()
        .filter_map(|o| Some((o.output_key()?.to_owned(), o.output_value()?.to_owned())))
        .collect();
    Ok(StackDescription {
        stack_id: stack_id.to_owned(),
        status,
        outputs,
    })
}

fn is_missing_stack(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some("ValidationError") && message.is_some_and(|m| m.contains("does not exist"))
}

fn is_no_change(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some("ValidationError")
        && message.is_some_and(|m| m.contains("No updates are to be performed"))
}

fn is_conflict(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some("AlreadyExistsException")
        || message.is_some_and(|m| m.contains("_IN_PROGRESS state"))
}

fn mutation_error<E, R>(operation: &str, err: SdkError<E, R>) -> LzError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if is_conflict(err.code(), err.message()) {
        from_sdk_error_as(ErrorKind::ConcurrentUpsertConflict, operation, err)
    } else {
        from_sdk_error(operation, err)
    }
}

#[async_trait]
impl StackProvider for CloudFormationStackProvider {
    async fn describe(
        &self,
        session: &ProviderSession,
        stack_name: &str,
    ) -> Result<Option<StackDescription>, LzError> {
        let result = self
            .client(session)
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;
        match result {
            Ok(output) => output.stacks().first().map(describe_stack).transpose(),
            Err(e) if is_missing_stack(e.code(), e.message()) => Ok(None),
            Err(e) => Err(from_sdk_error("DescribeStacks", e)),
        }
    }

    async fn create(&self, session: &ProviderSession, spec: &StackSpec) -> Result<String, LzError> {
        debug!(stack_name = %spec.name, account_id = %session.account_id, region = %session.region, "CreateStack");
        let output = self
            .client(session)
            .create_stack()
            .stack_name(&spec.name)
            .template_body(&spec.template_body)
            .set_parameters(Some(parameters(spec)))
            .set_capabilities(Some(capabilities(spec)))
            .send()
            .await
            .map_err(|e| mutation_error("CreateStack", e))?;
        output
            .stack_id()
            .map(str::to_owned)
            .ok_or_else(|| LzError::provider("CreateStack returned no stack id"))
    }

    async fn update(
        &self,
        session: &ProviderSession,
        stack_id: &str,
        spec: &StackSpec,
    ) -> Result<UpdateOutcome, LzError> {
        debug!(stack_id, account_id = %session.account_id, region = %session.region, "UpdateStack");
        let result = self
            .client(session)
            .update_stack()
            .stack_name(stack_id)
            .template_body(&spec.template_body)
            .set_parameters(Some(parameters(spec)))
            .set_capabilities(Some(capabilities(spec)))
            .send()
            .await;
        match result {
            Ok(_) => Ok(UpdateOutcome::Updated),
            Err(e) if is_no_change(e.code(), e.message()) => Ok(UpdateOutcome::NoChange),
            Err(e) => Err(mutation_error("UpdateStack", e)),
        }
    }
}
