//! Drives one job through the seven stages.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use super::config::StageConfig;
use super::stages::{fallback_query, finalize, is_direct_locator, normalize};
use super::types::{JobOutcome, SequencerError, Stage};
use crate::acquisition::{AcquisitionContext, AcquisitionLauncher};
use crate::collaborators::{DiscoveryRequest, Enricher, LinkConverter, TargetDiscovery};
use crate::events::EventSink;
use crate::manifest::{self, ManifestStatus, ManifestStore, Query};
use crate::metrics;
use crate::orchestrator::Job;

/// Runs one job to a terminal outcome.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &Job) -> Result<JobOutcome, SequencerError>;
}

/// The production [`JobProcessor`].
pub struct StageSequencer {
    config: StageConfig,
    store: ManifestStore,
    music_dir: PathBuf,
    converter: Arc<dyn LinkConverter>,
    discovery: Arc<dyn TargetDiscovery>,
    enricher: Option<Arc<dyn Enricher>>,
    launcher: Arc<dyn AcquisitionLauncher>,
    events: EventSink,
}

impl StageSequencer {
    pub fn new(
        config: StageConfig,
        store: ManifestStore,
        music_dir: impl Into<PathBuf>,
        converter: Arc<dyn LinkConverter>,
        discovery: Arc<dyn TargetDiscovery>,
        launcher: Arc<dyn AcquisitionLauncher>,
        events: EventSink,
    ) -> Self {
        Self {
            config,
            store,
            music_dir: music_dir.into(),
            converter,
            discovery,
            enricher: None,
            launcher,
            events,
        }
    }

    /// Enables the optional enrichment stage.
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    fn log(&self, job: &Job, stage: Stage, line: impl AsRef<str>) {
        self.events
            .log(Some(&job.id), format!("{} {}", stage.prefix(), line.as_ref()));
    }

    fn skip(&self, job: &Job, stage: Stage, reason: impl Into<String>) -> JobOutcome {
        let reason = reason.into();
        self.log(job, stage, format!("Skipping: {}", reason));
        JobOutcome::skipped(reason)
    }

    async fn resolve_query(
        &self,
        job: &Job,
        path: &Path,
    ) -> Result<Result<Query, JobOutcome>, SequencerError> {
        let stage = Stage::LinkConversion;
        let timeout = self.config.link_conversion_timeout();
        let started = Instant::now();
        let converted =
            tokio::time::timeout(timeout, self.converter.convert(&job.url, path)).await;
        observe(stage, started);

        let query = match converted {
            Err(_) => {
                return Ok(Err(self.skip(
                    job,
                    stage,
                    format!("link conversion timed out after {}s", timeout.as_secs()),
                )))
            }
            Ok(Err(e)) => {
                return Ok(Err(self.skip(
                    job,
                    stage,
                    format!("link conversion failed: {}", e),
                )))
            }
            Ok(Ok(Some(query))) if query.is_identifying() => query,
            Ok(Ok(_)) => {
                let current = manifest::read_manifest(path).await?;
                fallback_query(&current)
            }
        };

        if !query.is_identifying() {
            return Ok(Err(self.skip(job, stage, "no artist or album found")));
        }

        let stored = query.clone();
        manifest::update(path, move |m| {
            m.query = Some(stored);
            m.status = ManifestStatus::Resolving;
        })
        .await?;
        self.log(job, stage, format!("Resolved: {}", query.label()));
        Ok(Ok(query))
    }

    async fn discover_target(&self, job: &Job, query: &Query) -> Result<String, JobOutcome> {
        let stage = Stage::TargetDiscovery;
        if let Some(channel) = query.channel().filter(|c| is_direct_locator(c)) {
            self.log(job, stage, format!("Direct locator: {}", channel));
            return Ok(channel.to_string());
        }

        let request = DiscoveryRequest {
            root: query.discovery_root().unwrap_or_default().to_string(),
            media: query.media.clone().unwrap_or_default(),
            album: query.album().unwrap_or_default().to_string(),
            track: query.track().unwrap_or_default().to_string(),
        };
        let timeout = self.config.target_discovery_timeout();
        let started = Instant::now();
        let found = tokio::time::timeout(timeout, self.discovery.discover(&request)).await;
        observe(stage, started);

        match found {
            Err(_) => Err(self.skip(
                job,
                stage,
                format!("target discovery timed out after {}s", timeout.as_secs()),
            )),
            Ok(Err(e)) => Err(self.skip(job, stage, format!("target discovery failed: {}", e))),
            Ok(Ok(None)) => Err(self.skip(job, stage, "no playable target found")),
            Ok(Ok(Some(url))) if !url.starts_with("https") => {
                Err(self.skip(job, stage, format!("rejected non-https target {}", url)))
            }
            Ok(Ok(Some(url))) => {
                self.log(job, stage, format!("Target: {}", url));
                Ok(url)
            }
        }
    }

    async fn enrich(&self, job: &Job, path: &Path) {
        let stage = Stage::Enrichment;
        let Some(enricher) = &self.enricher else {
            self.log(job, stage, "Enrichment not configured");
            return;
        };
        let timeout = self.config.enrichment_timeout();
        let started = Instant::now();
        let result = tokio::time::timeout(timeout, enricher.enrich(path)).await;
        observe(stage, started);
        match result {
            Ok(Ok(())) => self.log(job, stage, "Enrichment complete"),
            Ok(Err(e)) => warn!("[{}] Enrichment failed, continuing: {}", job.id, e),
            Err(_) => warn!(
                "[{}] Enrichment timed out after {}s, continuing",
                job.id,
                timeout.as_secs()
            ),
        }
    }

    async fn run_stages(&self, job: &Job, path: &Path) -> Result<JobOutcome, SequencerError> {
        // 2. link conversion
        let query = match self.resolve_query(job, path).await? {
            Ok(query) => query,
            Err(skipped) => return Ok(skipped),
        };

        // 3. target discovery
        let target = match self.discover_target(job, &query).await {
            Ok(target) => target,
            Err(skipped) => return Ok(skipped),
        };

        // 4. enrichment
        self.enrich(job, path).await;

        // 5. normalization
        let current = manifest::read_manifest(path).await?;
        if let Some(tracks) = normalize(&current) {
            self.log(
                job,
                Stage::Normalization,
                format!("Normalized {} track(s)", tracks.len()),
            );
            manifest::update(path, move |m| m.tracks = Some(tracks)).await?;
        } else {
            self.log(job, Stage::Normalization, "Tracks already normalized");
        }

        // 6. finalization
        let music_dir = self.music_dir.clone();
        let finalized =
            manifest::update(path, move |m| finalize(m, &target, &music_dir)).await?;
        if finalized.track_list().is_empty() {
            return Err(SequencerError::NoTracks);
        }
        self.log(
            job,
            Stage::Finalization,
            format!("Manifest ready with {} track(s)", finalized.track_list().len()),
        );

        // 7. acquisition
        self.log(job, Stage::Acquisition, "Handing off to acquisition worker");
        let ctx = AcquisitionContext::new(job.id.clone(), self.events.clone());
        let started = Instant::now();
        let acquired = match self.config.acquisition_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.launcher.acquire(path, &ctx))
                .await
                .map_err(|_| SequencerError::AcquisitionTimeout(limit.as_secs()))?,
            None => self.launcher.acquire(path, &ctx).await,
        };
        observe(Stage::Acquisition, started);
        let report = acquired?;

        metrics::TRACKS_TOTAL
            .with_label_values(&["completed"])
            .inc_by(report.completed as u64);
        metrics::TRACKS_TOTAL
            .with_label_values(&["failed"])
            .inc_by(report.failed as u64);
        self.log(
            job,
            Stage::Acquisition,
            format!(
                "Acquired {} track(s), {} failed",
                report.completed, report.failed
            ),
        );

        manifest::delete(path).await?;
        Ok(JobOutcome::Completed)
    }
}

fn observe(stage: Stage, started: Instant) {
    metrics::STAGE_DURATION
        .with_label_values(&[stage.as_str()])
        .observe(started.elapsed().as_secs_f64());
}

#[async_trait]
impl JobProcessor for StageSequencer {
    async fn process(&self, job: &Job) -> Result<JobOutcome, SequencerError> {
        self.log(job, Stage::CreateManifest, format!("Creating manifest for {}", job.url));
        let (path, _) = self.store.create(&job.url, &self.music_dir).await?;
        tokio::time::sleep(self.config.settle_delay()).await;

        let result = self.run_stages(job, &path).await;
        if let Err(e) = &result {
            warn!("[{}] Job failed, keeping manifest {}: {}", job.id, path.display(), e);
            if let Err(mark_err) =
                manifest::update(&path, |m| m.status = ManifestStatus::Failed).await
            {
                warn!("[{}] Could not mark manifest failed: {}", job.id, mark_err);
            }
        }
        result
    }
}
