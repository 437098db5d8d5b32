//! Stack provider abstraction.
//!
//! A [`StackProvider`] is the infrastructure service that owns stacks
//! (CloudFormation in production). Every call carries a [`ProviderSession`]
//! naming the account, region and the credentials to act with.

pub mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;

use lzstack_model::{AccountId, AwsRegion, DelegatedCredentials, LzError, StackStatus};

pub use memory::InMemoryStackProvider;

/// Where and as whom a provider call runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSession {
    /// Account that owns the stack.
    pub account_id: AccountId,
    /// Region of the stack.
    pub region: AwsRegion,
    /// Delegated credentials; `None` means ambient identity.
    pub credentials: Option<DelegatedCredentials>,
}

/// Desired stack definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSpec {
    /// Stack name.
    pub name: String,
    /// Template body.
    pub template_body: String,
    /// Template parameters.
    pub parameters: BTreeMap<String, String>,
    /// Acknowledged capabilities.
    pub capabilities: BTreeSet<String>,
}

/// Current state of an existing stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    /// Provider stack id.
    pub stack_id: String,
    /// Provider status.
    pub status: StackStatus,
    /// Stack outputs.
    pub outputs: BTreeMap<String, String>,
}

/// Result of an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// An update was started.
    Updated,
    /// The stack already matched; nothing was started.
    NoChange,
}

/// Infrastructure service that owns stacks.
#[async_trait]
pub trait StackProvider: Send + Sync + fmt::Debug {
    /// Describe a stack by name; `None` if it does not exist.
    async fn describe(
        &self,
        session: &ProviderSession,
        stack_name: &str,
    ) -> Result<Option<StackDescription>, LzError>;

    /// Start creating a stack and return its id.
    async fn create(&self, session: &ProviderSession, spec: &StackSpec) -> Result<String, LzError>;

    /// Start updating an existing stack.
    async fn update(
        &self,
        session: &ProviderSession,
        stack_id: &str,
        spec: &StackSpec,
    ) -> Result<UpdateOutcome, LzError>;
}
