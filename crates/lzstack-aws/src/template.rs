//! Template store reading S3 objects and local files.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use tracing::debug;

use lzstack_core::{FileTemplateStore, TemplateStore};
use lzstack_model::{LzError, TemplateLocation};

/// Resolves `s3://` locations with `GetObject` and file paths from disk.
#[derive(Debug, Clone)]
pub struct AwsTemplateStore {
    s3: aws_sdk_s3::Client,
    files: FileTemplateStore,
}

impl AwsTemplateStore {
    /// Create a store from a loaded SDK config.
    ///
    /// Path-style addressing is forced when the config carries an endpoint
    /// override, as local emulators expect.
    #[must_use]
    pub fn new(sdk_config: &SdkConfig, files: FileTemplateStore) -> Self {
        let config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(sdk_config.endpoint_url().is_some())
            .build();
        Self {
            s3: aws_sdk_s3::Client::from_conf(config),
            files,
        }
    }
}

#[async_trait]
impl TemplateStore for AwsTemplateStore {
    async fn resolve(&self, location: &TemplateLocation) -> Result<String, LzError> {
        let TemplateLocation::S3 { bucket, key } = location else {
            return self.files.resolve(location).await;
        };

        debug!(bucket, key, "fetching template from S3");
        let output = self
            .s3
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                LzError::template_not_found(format!(
                    "cannot fetch template {location}: {}",
                    DisplayErrorContext(&e)
                ))
                .with_source(e)
            })?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| {
                LzError::template_not_found(format!("cannot read template {location}"))
                    .with_source(e)
            })?
            .into_bytes();
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            LzError::template_not_found(format!("template {location} is not valid UTF-8"))
                .with_source(e)
        })
    }
}
