//! The acquisition worker: fetches every pending unit of one manifest.

use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::channel::WorkerChannel;
use super::config::FetchConfig;
use super::error::AcquisitionError;
use super::fetch::{build_fetch_args, is_playlist_url, output_path, FetchRequest, FetchTool};
use super::retry::{RetryDecision, RetryState};
use crate::manifest::{self, ManifestStatus, TrackStatus};
use crate::protocol::WorkerMessage;

/// Counters for one worker run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub total: usize,
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    pub refreshes: usize,
}

/// Drives the units of a manifest through the fetch tool.
pub struct AcquisitionWorker<F> {
    tool: F,
    config: FetchConfig,
    cookies_override: Option<PathBuf>,
}

impl<F: FetchTool> AcquisitionWorker<F> {
    pub fn new(tool: F, config: FetchConfig) -> Self {
        Self {
            tool,
            config,
            cookies_override: None,
        }
    }

    /// Uses `path` instead of `{manifest_dir}/cookies.txt`.
    pub fn with_cookies_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_override = Some(path.into());
        self
    }

    pub fn tool(&self) -> &F {
        &self.tool
    }

    fn cookies_path(&self, manifest_path: &Path) -> PathBuf {
        self.cookies_override.clone().unwrap_or_else(|| {
            manifest_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("cookies.txt")
        })
    }

    /// Runs the worker and reports a fatal error to the peer as `ERROR`.
    pub async fn serve<C>(
        &self,
        manifest_path: &Path,
        channel: &mut C,
    ) -> Result<WorkerSummary, AcquisitionError>
    where
        C: WorkerChannel + ?Sized,
    {
        match self.run(manifest_path, channel).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                if let Err(send_err) = channel.send(WorkerMessage::error(e.to_string())).await {
                    warn!("Could not report worker error: {}", send_err);
                }
                Err(e)
            }
        }
    }

    /// Attempts every `pending` or `failed` unit once (plus credential
    /// retries) and persists each outcome as soon as it is known.
    pub async fn run<C>(
        &self,
        manifest_path: &Path,
        channel: &mut C,
    ) -> Result<WorkerSummary, AcquisitionError>
    where
        C: WorkerChannel + ?Sized,
    {
        let manifest = manifest::read_manifest(manifest_path).await?;

        if manifest.music_download_path.as_os_str().is_empty() {
            return Err(AcquisitionError::InvalidManifest(
                "music_download_path is missing".to_string(),
            ));
        }
        let url = manifest
            .download_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                AcquisitionError::InvalidManifest("download_url is missing".to_string())
            })?;

        let download_dir = manifest.music_download_path.clone();
        tokio::fs::create_dir_all(&download_dir)
            .await
            .map_err(|source| AcquisitionError::DownloadDir {
                path: download_dir.clone(),
                source,
            })?;

        let cookies = self.cookies_path(manifest_path);
        if !cookies.exists() {
            warn!(path = %cookies.display(), "Cookies file not found, continuing without it");
        }

        // Retry pass: failed units from an earlier run start over.
        let manifest = manifest::update(manifest_path, |m| {
            m.status = ManifestStatus::Acquiring;
            if let Some(tracks) = m.tracks.as_mut() {
                for track in tracks.iter_mut() {
                    if track.status == TrackStatus::Failed {
                        track.status = TrackStatus::Pending;
                    }
                }
            }
        })
        .await?;

        let session_id = manifest.session_id.clone();
        let tracks = manifest.track_list().to_vec();
        let total = tracks.len();
        let playlist = is_playlist_url(&url);
        let mut summary = WorkerSummary {
            total,
            ..Default::default()
        };

        info!(
            "Acquiring {} unit(s) for session {} from {}",
            total, session_id, url
        );

        for (index, track) in tracks.iter().enumerate() {
            if !track.status.needs_attempt() {
                debug!("Skipping unit {} ({})", index + 1, track.status);
                continue;
            }
            summary.attempted += 1;

            let number = track.number.unwrap_or(index as u32 + 1);
            let output = output_path(
                &download_dir,
                number,
                &track.title,
                &session_id,
                &self.config.audio_format,
            );
            let mut request = FetchRequest {
                url: url.clone(),
                output: output.clone(),
                cookies: cookies.clone(),
                playlist_item: playlist.then_some(number),
                fallback_client: false,
            };

            let mut retry = RetryState::new();
            let mut failure: Option<String> = None;
            while retry.begin_attempt() {
                let args = build_fetch_args(&self.config, &request);
                debug!(
                    "Unit {} attempt {}/{}",
                    number,
                    retry.attempts(),
                    retry.max_attempts()
                );
                match self.fetch_with_progress(&args, channel).await? {
                    Ok(()) => {
                        failure = None;
                        break;
                    }
                    Err(diagnostic) => match retry.record_failure(diagnostic.clone()) {
                        RetryDecision::RefreshAndRetry => {
                            warn!("Unit {} hit expired credentials, requesting refresh", number);
                            self.await_refresh(channel).await?;
                            summary.refreshes += 1;
                            if self.config.update_on_refresh {
                                if let Err(e) = self.tool.self_update().await {
                                    warn!("Fetch tool update failed: {}", e);
                                }
                            }
                            request.fallback_client = true;
                            failure = Some(diagnostic);
                        }
                        RetryDecision::GiveUp => {
                            failure = Some(diagnostic);
                            break;
                        }
                    },
                }
            }

            match failure {
                None => {
                    info!("Unit {} completed: {}", number, output.display());
                    summary.completed += 1;
                    manifest::update(manifest_path, |m| {
                        if let Some(t) = m.tracks.as_mut().and_then(|t| t.get_mut(index)) {
                            t.status = TrackStatus::Completed;
                            t.local_file_path = Some(output.clone());
                            t.error_message = None;
                        }
                        m.total_tracks = Some(total);
                    })
                    .await?;
                }
                Some(diagnostic) => {
                    warn!("Unit {} failed: {}", number, diagnostic);
                    summary.failed += 1;
                    manifest::update(manifest_path, |m| {
                        if let Some(t) = m.tracks.as_mut().and_then(|t| t.get_mut(index)) {
                            t.status = TrackStatus::Failed;
                            t.error_message = Some(diagnostic.clone());
                        }
                        m.total_tracks = Some(total);
                    })
                    .await?;
                    channel
                        .send(WorkerMessage::track_error(track.title.clone(), diagnostic))
                        .await?;
                }
            }
        }

        manifest::update(manifest_path, |m| {
            m.status = ManifestStatus::Acquired;
            m.total_tracks = Some(total);
        })
        .await?;

        info!(
            "Session {} done: {} completed, {} failed",
            session_id, summary.completed, summary.failed
        );
        Ok(summary)
    }

    /// Runs one fetch, forwarding progress to the peer as it arrives.
    /// The inner result carries the failure diagnostic.
    async fn fetch_with_progress<C>(
        &self,
        args: &[String],
        channel: &mut C,
    ) -> Result<Result<(), String>, AcquisitionError>
    where
        C: WorkerChannel + ?Sized,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let fetch = self.tool.fetch(args, tx);
        tokio::pin!(fetch);

        let result = loop {
            tokio::select! {
                res = &mut fetch => break res,
                Some(value) = rx.recv() => {
                    channel.send(WorkerMessage::progress(value)).await?;
                }
            }
        };
        while let Ok(value) = rx.try_recv() {
            channel.send(WorkerMessage::progress(value)).await?;
        }

        Ok(result.map_err(|e| e.diagnostic()))
    }

    /// Sends the refresh request and blocks until the parent answers.
    async fn await_refresh<C>(&self, channel: &mut C) -> Result<(), AcquisitionError>
    where
        C: WorkerChannel + ?Sized,
    {
        channel.send(WorkerMessage::RefreshCookiesRequest).await?;
        loop {
            match channel.recv().await? {
                Some(WorkerMessage::RefreshCookiesDone) => return Ok(()),
                Some(other) => debug!("Ignoring {:?} while waiting for refresh", other),
                None => return Err(AcquisitionError::ChannelClosed),
            }
        }
    }
}
