//! Data model for lzstack landing-zone stack orchestration.
//!
//! Plain, serde-derived types shared by the orchestration components, the
//! AWS adapters and the deploy binary. Nothing in this crate performs I/O.
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]

pub mod account;
pub mod credentials;
pub mod error;
pub mod output;
pub mod request;
pub mod types;

pub use account::Account;
pub use credentials::DelegatedCredentials;
pub use error::{ErrorKind, LzError, LzResult};
pub use output::{
    BatchReport, ResourceRef, StackState, StackStatus, TargetFailure, UpsertOutcome, UpsertResult,
    Warning,
};
pub use request::{
    Exclusion, InvocationRequest, OwnershipSpec, TemplateLocation, TemplateRef, UpsertRequest,
    VpcShareSpec,
};
pub use types::{AccountId, AwsRegion, Target};
