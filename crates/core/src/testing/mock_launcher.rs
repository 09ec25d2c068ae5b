//! Mock acquisition launcher for testing.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::acquisition::{
    AcquisitionContext, AcquisitionError, AcquisitionLauncher, AcquisitionReport,
};
use crate::events::PipelineEvent;
use crate::manifest::{self, Manifest, ManifestStatus, TrackStatus};

/// Mock implementation of the AcquisitionLauncher trait.
///
/// Marks every track completed (or fails the job when configured) without
/// running any worker, and records the manifest as it was handed off.
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    fail: Arc<RwLock<Option<String>>>,
    seen: Arc<RwLock<Vec<Manifest>>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next acquisitions with this worker error.
    pub async fn set_fail(&self, message: Option<String>) {
        *self.fail.write().await = message;
    }

    /// Manifests as read at handoff time.
    pub async fn seen_manifests(&self) -> Vec<Manifest> {
        self.seen.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.seen.read().await.len()
    }
}

#[async_trait]
impl AcquisitionLauncher for MockLauncher {
    async fn acquire(
        &self,
        manifest_path: &Path,
        ctx: &AcquisitionContext,
    ) -> Result<AcquisitionReport, AcquisitionError> {
        let handed_off = manifest::read_manifest(manifest_path).await?;
        self.seen.write().await.push(handed_off);

        if let Some(message) = self.fail.read().await.clone() {
            return Err(AcquisitionError::Worker(message));
        }

        ctx.events.emit(PipelineEvent::FileProgress {
            job_id: ctx.job_id.clone(),
            value: 100.0,
        });
        let done = manifest::update(manifest_path, |m| {
            if let Some(tracks) = m.tracks.as_mut() {
                for track in tracks.iter_mut() {
                    track.status = TrackStatus::Completed;
                }
            }
            m.total_tracks = Some(m.track_list().len());
            m.status = ManifestStatus::Acquired;
        })
        .await?;

        Ok(AcquisitionReport {
            completed: done.track_list().len(),
            failed: 0,
            refreshes: 0,
        })
    }
}
