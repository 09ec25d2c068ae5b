//! Out-of-band credential refresh.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::config::CredentialsConfig;
use crate::metrics;
use crate::process::{run_with_timeout, CommandSpec, ProcessError};

/// How a refresh attempt ended. Every variant releases a waiting worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The exporter exited 0.
    Refreshed,
    /// The exporter exited non-zero.
    SoftFailure { code: Option<i32> },
    /// The exporter ran past its ceiling and was killed.
    TimedOut,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refreshed => "refreshed",
            Self::SoftFailure { .. } => "soft_failure",
            Self::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    /// The exporter could not be started.
    #[error("failed to spawn credential exporter {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Refreshes the authentication material used by the fetch tool.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self) -> Result<RefreshOutcome, RefreshError>;
}

/// Runs the configured exporter, one at a time.
pub struct CookieExporter {
    exporter: CommandSpec,
    service: String,
    cookies_path: PathBuf,
    timeout: Duration,
    lock: Mutex<()>,
}

impl CookieExporter {
    pub fn new(config: &CredentialsConfig, cookies_path: impl Into<PathBuf>) -> Self {
        Self {
            exporter: config.exporter.clone(),
            service: config.service.clone(),
            cookies_path: cookies_path.into(),
            timeout: Duration::from_secs(config.timeout_secs),
            lock: Mutex::new(()),
        }
    }

    pub fn cookies_path(&self) -> &Path {
        &self.cookies_path
    }
}

#[async_trait]
impl CredentialRefresher for CookieExporter {
    async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        let _guard = self.lock.lock().await;

        if let Some(parent) = self.cookies_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        info!(
            "Refreshing {} credentials into {}",
            self.service,
            self.cookies_path.display()
        );
        let cmd = self.exporter.command([
            self.service.as_str().into(),
            self.cookies_path.as_os_str().to_os_string(),
        ]);
        let label = self.exporter.label();

        let outcome = match run_with_timeout(cmd, &label, Some(self.timeout)).await {
            Ok(output) if output.success() => RefreshOutcome::Refreshed,
            Ok(output) => {
                warn!(
                    "Credential exporter exited with {:?}: {}",
                    output.code(),
                    output.stderr.trim()
                );
                RefreshOutcome::SoftFailure {
                    code: output.code(),
                }
            }
            Err(ProcessError::Timeout { timeout_secs, .. }) => {
                warn!("Credential exporter timed out after {}s", timeout_secs);
                RefreshOutcome::TimedOut
            }
            Err(ProcessError::Spawn { program, source }) => {
                metrics::CREDENTIAL_REFRESHES
                    .with_label_values(&["spawn_error"])
                    .inc();
                return Err(RefreshError::Spawn { program, source });
            }
            Err(ProcessError::Io(e)) => return Err(RefreshError::Io(e)),
        };

        metrics::CREDENTIAL_REFRESHES
            .with_label_values(&[outcome.as_str()])
            .inc();
        info!("Credential refresh finished: {}", outcome.as_str());
        Ok(outcome)
    }
}

/// Runs one refresh when `cookies_path` does not exist yet.
pub async fn refresh_if_missing(
    refresher: &dyn CredentialRefresher,
    cookies_path: &Path,
) -> Option<Result<RefreshOutcome, RefreshError>> {
    if cookies_path.exists() {
        return None;
    }
    info!(
        "No cookie jar at {}, running initial refresh",
        cookies_path.display()
    );
    Some(refresher.refresh().await)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn config(program: &str, args: &[&str], timeout_secs: u64) -> CredentialsConfig {
        CredentialsConfig {
            exporter: CommandSpec::new(program, args),
            timeout_secs,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_refresh_writes_jar() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("cookies.txt");
        // sh -c '<script>' exporter <service> <path>
        let exporter = CookieExporter::new(
            &config(
                "sh",
                &["-c", "echo \"# $1\" > \"$2\"", "exporter"],
                5,
            ),
            &jar,
        );
        let outcome = exporter.refresh().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Refreshed);
        let contents = tokio::fs::read_to_string(&jar).await.unwrap();
        assert_eq!(contents.trim(), "# youtube");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_soft_failure() {
        let dir = TempDir::new().unwrap();
        let exporter =
            CookieExporter::new(&config("sh", &["-c", "exit 4"], 5), dir.path().join("c.txt"));
        assert_eq!(
            exporter.refresh().await.unwrap(),
            RefreshOutcome::SoftFailure { code: Some(4) }
        );
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let dir = TempDir::new().unwrap();
        let exporter =
            CookieExporter::new(&config("sleep", &["5"], 1), dir.path().join("c.txt"));
        assert_eq!(exporter.refresh().await.unwrap(), RefreshOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_spawn_error_is_err() {
        let dir = TempDir::new().unwrap();
        let exporter = CookieExporter::new(
            &config("/nonexistent/exporter", &[], 5),
            dir.path().join("c.txt"),
        );
        assert!(matches!(
            exporter.refresh().await,
            Err(RefreshError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_refreshes_are_serialized() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("log");
        let script = format!(
            "echo start >> {0}; sleep 0.2; echo end >> {0}",
            log.display()
        );
        let exporter = Arc::new(CookieExporter::new(
            &config("sh", &["-c", &script], 5),
            dir.path().join("c.txt"),
        ));

        let a = tokio::spawn({
            let e = exporter.clone();
            async move { e.refresh().await }
        });
        let b = tokio::spawn({
            let e = exporter.clone();
            async move { e.refresh().await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let contents = tokio::fs::read_to_string(&log).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["start", "end", "start", "end"]);
    }

    #[tokio::test]
    async fn test_refresh_if_missing_skips_existing_jar() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("cookies.txt");
        tokio::fs::write(&jar, b"# jar").await.unwrap();
        let exporter = CookieExporter::new(&config("sh", &["-c", "exit 1"], 5), &jar);
        assert!(refresh_if_missing(&exporter, &jar).await.is_none());
    }
}
