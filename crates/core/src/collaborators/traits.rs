use async_trait::async_trait;
use std::path::Path;

use super::error::CollaboratorError;
use crate::manifest::Query;

/// Resolves a source link into a structured query.
#[async_trait]
pub trait LinkConverter: Send + Sync {
    /// `Ok(None)` means the link was understood but yielded no query; the
    /// converter may still have written one into the manifest.
    async fn convert(
        &self,
        url: &str,
        manifest_path: &Path,
    ) -> Result<Option<Query>, CollaboratorError>;
}

/// Input to target discovery.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveryRequest {
    /// Channel URL, else artist URL.
    pub root: String,
    pub media: String,
    pub album: String,
    pub track: String,
}

/// Finds the playable locator for a query.
#[async_trait]
pub trait TargetDiscovery: Send + Sync {
    async fn discover(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<Option<String>, CollaboratorError>;
}

/// Adds metadata to a manifest in place.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, manifest_path: &Path) -> Result<(), CollaboratorError>;
}
