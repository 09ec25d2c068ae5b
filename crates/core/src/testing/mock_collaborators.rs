//! Mock collaborators for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::collaborators::{
    CollaboratorError, DiscoveryRequest, Enricher, LinkConverter, TargetDiscovery,
};
use crate::manifest::{self, Query};

/// Mock implementation of the LinkConverter trait.
///
/// Returns a configured query and can write a patch into the manifest the
/// way a real converter writes its side-channel fields.
#[derive(Debug, Clone, Default)]
pub struct MockLinkConverter {
    query: Arc<RwLock<Option<Query>>>,
    manifest_patch: Arc<RwLock<Option<Value>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    error: Arc<RwLock<Option<String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockLinkConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query returned by the next conversions.
    pub async fn set_query(&self, query: Option<Query>) {
        *self.query.write().await = query;
    }

    /// JSON object merged into the manifest on every conversion.
    pub async fn set_manifest_patch(&self, patch: Value) {
        *self.manifest_patch.write().await = Some(patch);
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Make conversions fail with this message.
    pub async fn set_error(&self, message: Option<String>) {
        *self.error.write().await = message;
    }

    pub async fn recorded_urls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl LinkConverter for MockLinkConverter {
    async fn convert(
        &self,
        url: &str,
        manifest_path: &Path,
    ) -> Result<Option<Query>, CollaboratorError> {
        self.calls.write().await.push(url.to_string());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.error.read().await.clone() {
            return Err(CollaboratorError::Failed {
                tool: "mock-converter".to_string(),
                code: Some(1),
                stderr: message,
            });
        }

        let patch = self.manifest_patch.read().await.clone();
        if let Some(Value::Object(map)) = patch {
            manifest::patch(manifest_path, map).await.map_err(|e| {
                CollaboratorError::invalid_output("mock-converter", e.to_string())
            })?;
        }

        Ok(self.query.read().await.clone())
    }
}

/// Mock implementation of the TargetDiscovery trait.
#[derive(Debug, Clone, Default)]
pub struct MockTargetDiscovery {
    result: Arc<RwLock<Option<String>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    requests: Arc<RwLock<Vec<DiscoveryRequest>>>,
}

impl MockTargetDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_result(&self, result: Option<String>) {
        *self.result.write().await = result;
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn recorded_requests(&self) -> Vec<DiscoveryRequest> {
        self.requests.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[async_trait]
impl TargetDiscovery for MockTargetDiscovery {
    async fn discover(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<Option<String>, CollaboratorError> {
        self.requests.write().await.push(request.clone());
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.result.read().await.clone())
    }
}

/// Mock implementation of the Enricher trait.
#[derive(Debug, Clone, Default)]
pub struct MockEnricher {
    fail: Arc<RwLock<bool>>,
    calls: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl Enricher for MockEnricher {
    async fn enrich(&self, manifest_path: &Path) -> Result<(), CollaboratorError> {
        self.calls.write().await.push(manifest_path.to_path_buf());
        if *self.fail.read().await {
            return Err(CollaboratorError::Failed {
                tool: "mock-enricher".to_string(),
                code: Some(1),
                stderr: "quota exceeded".to_string(),
            });
        }
        Ok(())
    }
}
