//! Landing-zone stack orchestration.
//!
//! Resolves ownership rules into (account, region) targets and drives one
//! stack per target to the requested definition, assuming roles into
//! foreign accounts where needed.
//!
//! # Architecture
//!
//! ```text
//! handle_invocation / Orchestrator (batch, bounded concurrency)
//!        |
//!        +--> TargetResolver (AccountDirectory + SharingPredicate)
//!        |
//!        +--> SharedKeyAllocator (exactly-once per target and kind)
//!        |
//!        v
//!   StackUpsertEngine
//!        |
//!        +--> StackRegistry (one handle and lock per target)
//!        +--> CredentialBroker (TrustProvider)
//!        +--> TemplateStore
//!        v
//!   StackProvider (CloudFormation or in-memory)
//! ```

pub mod allocator;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod engine;
pub mod handler;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod retry;
pub mod sharing;
pub mod state;
pub mod template;

pub use allocator::SharedKeyAllocator;
pub use config::{LzConfig, ProviderKind, WaitPolicy};
pub use credentials::{CredentialBroker, CredentialSource, StaticTrustProvider, TrustProvider};
pub use directory::{
    AccountDirectory, AccountSource, JsonFileAccountSource, StaticAccountSource, ou_member_keys,
};
pub use engine::StackUpsertEngine;
pub use handler::{InvocationContext, handle_invocation};
pub use orchestrator::{Deployment, Orchestrator, SharedResource};
pub use provider::{
    InMemoryStackProvider, ProviderSession, StackDescription, StackProvider, StackSpec,
    UpdateOutcome,
};
pub use registry::{StackHandle, StackRegistry};
pub use resolver::{OwnershipRule, Resolution, TargetResolver};
pub use retry::RetryPolicy;
pub use sharing::{SharingPredicate, VpcSharing};
pub use template::{FileTemplateStore, StaticTemplateStore, TemplateStore, resolve_template};
