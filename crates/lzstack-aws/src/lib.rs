//! AWS adapters for lzstack.
//!
//! - [`StsTrustProvider`]: delegated credentials via `sts:AssumeRole`.
//! - [`CloudFormationStackProvider`]: stacks via CloudFormation.
//! - [`AwsTemplateStore`]: templates from S3 or the local filesystem.

pub mod cloudformation;
pub mod error;
pub mod sts;
pub mod template;

use aws_config::{BehaviorVersion, Region, SdkConfig};

use lzstack_core::LzConfig;

pub use cloudformation::CloudFormationStackProvider;
pub use sts::StsTrustProvider;
pub use template::AwsTemplateStore;

/// Load the ambient SDK config for the home region, honoring the endpoint
/// override.
pub async fn load_sdk_config(config: &LzConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.home_region.as_str().to_owned()));
    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    loader.load().await
}
