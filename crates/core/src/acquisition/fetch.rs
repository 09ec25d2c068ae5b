//! Fetch tool invocation (`yt-dlp` in production).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use super::config::FetchConfig;
use crate::process::run_with_timeout;

static PROGRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.\d+)%").unwrap());

/// Longest diagnostic tail kept from a failed run.
const DIAGNOSTIC_LIMIT: usize = 4096;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fetch failed (exit {code:?}): {diagnostic}")]
    Failed {
        code: Option<i32>,
        diagnostic: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Text used to classify the failure.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Failed { diagnostic, .. } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

/// One unit to fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub output: PathBuf,
    pub cookies: PathBuf,
    /// 1-based playlist item, set when `url` is a playlist.
    pub playlist_item: Option<u32>,
    /// Add the fallback extractor strategy.
    pub fallback_client: bool,
}

/// Builds the fetch tool argument list for `request`.
pub fn build_fetch_args(config: &FetchConfig, request: &FetchRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--extract-audio".into(),
        "--audio-format".into(),
        config.audio_format.clone(),
        "--audio-quality".into(),
        config.audio_quality.clone(),
        "--cookies".into(),
        request.cookies.display().to_string(),
        "--sleep-requests".into(),
        config.sleep_requests.to_string(),
        "--sleep-interval".into(),
        config.sleep_interval.to_string(),
        "-o".into(),
        request.output.display().to_string(),
    ];
    if let Some(item) = request.playlist_item {
        args.push("--playlist-items".into());
        args.push(item.to_string());
    }
    if request.fallback_client {
        args.push("--extractor-args".into());
        args.push(config.fallback_client.clone());
    }
    args.extend(config.extra_args.iter().cloned());
    args.push(request.url.clone());

    // Progress is parsed from stdout.
    args.retain(|a| a != "--no-progress");
    args
}

/// Whether `url` addresses a playlist rather than a single item.
pub fn is_playlist_url(url: &str) -> bool {
    url.contains("list=")
}

/// Title with filesystem-reserved characters replaced by spaces.
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '"' | '*' | '?' | '<' | '>' | '|' => ' ',
            other => other,
        })
        .collect()
}

/// `{dir}/{NN} - {safe_title} - {session_id}.{ext}`.
pub fn output_path(dir: &Path, number: u32, title: &str, session_id: &str, ext: &str) -> PathBuf {
    dir.join(format!(
        "{:02} - {} - {}.{}",
        number,
        safe_title(title),
        session_id,
        ext
    ))
}

/// Last percentage printed in `chunk`, if any.
pub fn parse_progress(chunk: &str) -> Option<f32> {
    PROGRESS_RE
        .captures_iter(chunk)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .last()
}

/// Fetches one unit given its full argument list.
#[async_trait]
pub trait FetchTool: Send + Sync {
    /// Runs the tool to completion, sending parsed progress percentages.
    async fn fetch(
        &self,
        args: &[String],
        progress: mpsc::UnboundedSender<f32>,
    ) -> Result<(), FetchError>;

    /// Updates the tool in place. No-op by default.
    async fn self_update(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// `yt-dlp` as a child process.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn label(&self) -> String {
        self.program.display().to_string()
    }
}

fn tail(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= DIAGNOSTIC_LIMIT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - DIAGNOSTIC_LIMIT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

#[async_trait]
impl FetchTool for YtDlpFetcher {
    async fn fetch(
        &self,
        args: &[String],
        progress: mpsc::UnboundedSender<f32>,
    ) -> Result<(), FetchError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FetchError::Spawn {
                program: self.label(),
                source,
            })?;

        let stderr_task = child.stderr.take().map(|mut err| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = err.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        // Progress lines end in '\r' as often as '\n', so scan raw chunks.
        let mut stdout_tail = String::new();
        if let Some(mut out) = child.stdout.take() {
            let mut buf = [0u8; 4096];
            loop {
                let n = out.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                let chunk = String::from_utf8_lossy(&buf[..n]);
                if let Some(value) = parse_progress(&chunk) {
                    let _ = progress.send(value);
                }
                stdout_tail.push_str(&chunk);
                if stdout_tail.len() > DIAGNOSTIC_LIMIT * 2 {
                    stdout_tail = tail(&stdout_tail);
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            return Ok(());
        }

        let diagnostic = if stderr.trim().is_empty() {
            tail(&stdout_tail)
        } else {
            tail(&stderr)
        };
        Err(FetchError::Failed {
            code: status.code(),
            diagnostic,
        })
    }

    async fn self_update(&self) -> Result<(), FetchError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-U");
        let output = run_with_timeout(cmd, &self.label(), Some(Duration::from_secs(120)))
            .await
            .map_err(|e| FetchError::Failed {
                code: None,
                diagnostic: e.to_string(),
            })?;
        debug!("Fetch tool update output: {}", output.stdout.trim());
        if output.success() {
            Ok(())
        } else {
            Err(FetchError::Failed {
                code: output.code(),
                diagnostic: tail(&output.stderr),
            })
        }
    }
}
