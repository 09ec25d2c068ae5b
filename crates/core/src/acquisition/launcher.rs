//! Parent side of the acquisition handoff.
//!
//! A launcher starts a worker for one manifest, relays its messages into
//! pipeline events, answers credential refresh requests and reports the
//! outcome once the worker has exited.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::channel::{memory_pair, LineChannel, WorkerChannel};
use super::error::AcquisitionError;
use super::fetch::FetchTool;
use super::worker::AcquisitionWorker;
use crate::credentials::CredentialRefresher;
use crate::events::{EventSink, PipelineEvent};
use crate::manifest::{self, Manifest, TrackStatus};
use crate::protocol::WorkerMessage;

/// Per-job context handed to a launcher.
#[derive(Debug, Clone)]
pub struct AcquisitionContext {
    pub job_id: String,
    pub events: EventSink,
}

impl AcquisitionContext {
    pub fn new(job_id: impl Into<String>, events: EventSink) -> Self {
        Self {
            job_id: job_id.into(),
            events,
        }
    }

    fn log(&self, line: impl Into<String>) {
        self.events.log(Some(&self.job_id), line);
    }
}

/// What a finished worker left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub completed: usize,
    pub failed: usize,
    pub refreshes: usize,
}

impl AcquisitionReport {
    fn from_manifest(manifest: &Manifest, refreshes: usize) -> Self {
        let tracks = manifest.track_list();
        Self {
            completed: tracks
                .iter()
                .filter(|t| t.status == TrackStatus::Completed)
                .count(),
            failed: tracks
                .iter()
                .filter(|t| t.status == TrackStatus::Failed)
                .count(),
            refreshes,
        }
    }
}

/// Starts an acquisition worker for a manifest and waits for it.
#[async_trait]
pub trait AcquisitionLauncher: Send + Sync {
    async fn acquire(
        &self,
        manifest_path: &Path,
        ctx: &AcquisitionContext,
    ) -> Result<AcquisitionReport, AcquisitionError>;
}

/// Relays worker messages until the worker hangs up.
///
/// Returns the number of refreshes served. A worker `ERROR` ends the relay
/// with [`AcquisitionError::Worker`].
pub async fn relay_worker<C>(
    channel: &mut C,
    ctx: &AcquisitionContext,
    refresher: &dyn CredentialRefresher,
) -> Result<usize, AcquisitionError>
where
    C: WorkerChannel + ?Sized,
{
    let mut refreshes = 0;
    while let Some(message) = channel.recv().await? {
        match message {
            WorkerMessage::Progress { value } => {
                ctx.events.emit(PipelineEvent::FileProgress {
                    job_id: ctx.job_id.clone(),
                    value,
                });
            }
            WorkerMessage::TrackError { track, message } => {
                warn!("[{}] Track failed: {}: {}", ctx.job_id, track, message);
                ctx.log(format!("Track failed: {}: {}", track, message));
            }
            WorkerMessage::Error { message } => {
                return Err(AcquisitionError::Worker(message));
            }
            WorkerMessage::RefreshCookiesRequest => {
                refreshes += 1;
                ctx.log("Credentials expired, refreshing");
                match refresher.refresh().await {
                    Ok(outcome) => ctx.log(format!("Credential refresh: {}", outcome.as_str())),
                    Err(e) => warn!("[{}] Credential refresh failed: {}", ctx.job_id, e),
                }
                if let Err(e) = channel.send(WorkerMessage::RefreshCookiesDone).await {
                    warn!("[{}] Could not release worker: {}", ctx.job_id, e);
                    break;
                }
            }
            WorkerMessage::RefreshCookiesDone => {
                debug!("[{}] Ignoring stray refresh acknowledgement", ctx.job_id);
            }
        }
    }
    Ok(refreshes)
}

/// Runs the worker binary as a child process speaking over stdio.
pub struct ProcessLauncher {
    program: PathBuf,
    config_path: Option<PathBuf>,
    cookies_path: PathBuf,
    refresher: Arc<dyn CredentialRefresher>,
}

impl ProcessLauncher {
    pub fn new(
        program: impl Into<PathBuf>,
        cookies_path: impl Into<PathBuf>,
        refresher: Arc<dyn CredentialRefresher>,
    ) -> Self {
        Self {
            program: program.into(),
            config_path: None,
            cookies_path: cookies_path.into(),
            refresher,
        }
    }

    /// Passes the config file to the worker through `RIPLINE_CONFIG`.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }
}

#[async_trait]
impl AcquisitionLauncher for ProcessLauncher {
    async fn acquire(
        &self,
        manifest_path: &Path,
        ctx: &AcquisitionContext,
    ) -> Result<AcquisitionReport, AcquisitionError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(manifest_path)
            .env("RIPLINE_COOKIES_PATH", &self.cookies_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(config) = &self.config_path {
            cmd.env("RIPLINE_CONFIG", config);
        }

        let mut child = cmd.spawn().map_err(|source| AcquisitionError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        if let Some(stderr) = child.stderr.take() {
            let job_id = ctx.job_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[{}] worker: {}", job_id, line);
                }
            });
        }

        let (stdout, stdin) = match (child.stdout.take(), child.stdin.take()) {
            (Some(out), Some(inp)) => (out, inp),
            _ => {
                let _ = child.kill().await;
                return Err(AcquisitionError::ChannelClosed);
            }
        };

        let mut channel = LineChannel::new(stdout, stdin);
        let relayed = relay_worker(&mut channel, ctx, self.refresher.as_ref()).await;
        drop(channel);

        let refreshes = match relayed {
            Ok(n) => n,
            Err(e) => {
                let _ = child.kill().await;
                return Err(e);
            }
        };

        let status = child.wait().await?;
        if !status.success() {
            return Err(AcquisitionError::WorkerExit {
                code: status.code(),
            });
        }

        let manifest = manifest::read_manifest(manifest_path).await?;
        Ok(AcquisitionReport::from_manifest(&manifest, refreshes))
    }
}

/// Runs an [`AcquisitionWorker`] on a task in this process, connected over
/// an in-memory channel.
pub struct InProcessLauncher<F> {
    worker: Arc<AcquisitionWorker<F>>,
    refresher: Arc<dyn CredentialRefresher>,
}

impl<F: FetchTool + 'static> InProcessLauncher<F> {
    pub fn new(worker: AcquisitionWorker<F>, refresher: Arc<dyn CredentialRefresher>) -> Self {
        Self {
            worker: Arc::new(worker),
            refresher,
        }
    }
}

#[async_trait]
impl<F: FetchTool + 'static> AcquisitionLauncher for InProcessLauncher<F> {
    async fn acquire(
        &self,
        manifest_path: &Path,
        ctx: &AcquisitionContext,
    ) -> Result<AcquisitionReport, AcquisitionError> {
        let (mut parent, mut child) = memory_pair();
        let worker = self.worker.clone();
        let path = manifest_path.to_path_buf();
        let handle = tokio::spawn(async move { worker.serve(&path, &mut child).await });

        let refreshes = relay_worker(&mut parent, ctx, self.refresher.as_ref()).await?;

        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(AcquisitionError::WorkerExit { code: None }),
        }

        let manifest = manifest::read_manifest(manifest_path).await?;
        Ok(AcquisitionReport::from_manifest(&manifest, refreshes))
    }
}
