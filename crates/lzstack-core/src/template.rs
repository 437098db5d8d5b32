//! Template body resolution.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use lzstack_model::{LzError, TemplateLocation, TemplateRef};

/// Fetches template bodies by location.
#[async_trait]
pub trait TemplateStore: Send + Sync + fmt::Debug {
    /// Return the template body stored at `location`.
    ///
    /// Fails with `TemplateNotFound` when the location cannot be read.
    async fn resolve(&self, location: &TemplateLocation) -> Result<String, LzError>;
}

/// Resolve a template reference to its body.
pub async fn resolve_template(
    store: &dyn TemplateStore,
    template: &TemplateRef,
) -> Result<String, LzError> {
    match template {
        TemplateRef::Inline(body) => Ok(body.clone()),
        TemplateRef::Location(location) => store.resolve(location).await,
    }
}

/// Reads file locations from the local filesystem.
///
/// Relative paths are joined onto the base directory when one is set. S3
/// locations are not readable here.
#[derive(Debug, Clone, Default)]
pub struct FileTemplateStore {
    base_dir: Option<PathBuf>,
}

impl FileTemplateStore {
    /// Resolve paths as given.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths under `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }
}

#[async_trait]
impl TemplateStore for FileTemplateStore {
    async fn resolve(&self, location: &TemplateLocation) -> Result<String, LzError> {
        let TemplateLocation::File { path } = location else {
            return Err(LzError::template_not_found(format!(
                "{location} is not a local file"
            )));
        };
        let full = match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.clone(),
        };
        debug!(path = %full.display(), "reading template");
        tokio::fs::read_to_string(&full).await.map_err(|e| {
            LzError::template_not_found(format!("cannot read template {}", full.display()))
                .with_source(e)
        })
    }
}

/// In-memory template bodies keyed by location.
#[derive(Debug, Default)]
pub struct StaticTemplateStore {
    templates: RwLock<HashMap<String, String>>,
}

impl StaticTemplateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `body` at `location`.
    pub fn insert(&self, location: &TemplateLocation, body: impl Into<String>) {
        self.templates
            .write()
            .insert(location.to_string(), body.into());
    }
}

#[async_trait]
impl TemplateStore for StaticTemplateStore {
    async fn resolve(&self, location: &TemplateLocation) -> Result<String, LzError> {
        self.templates
            .read()
            .get(&location.to_string())
            .cloned()
            .ok_or_else(|| LzError::template_not_found(format!("no template at {location}")))
    }
}
