//! External process invocation with a hard wall-clock ceiling.
//!
//! Every collaborator and helper process goes through [`run_with_timeout`].
//! Children are spawned with `kill_on_drop`, so dropping the future (for
//! example when an outer `tokio::time::timeout` fires) also terminates the
//! child.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// A configured external program plus its leading arguments.
///
/// `program = "node"`, `args = ["scripts/link-convert.js"]` runs
/// `node scripts/link-convert.js <call-specific args...>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Builds a command with the configured arguments followed by `extra`.
    pub fn command<I, S>(&self, extra: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.args(extra.into_iter().map(Into::into));
        cmd
    }

    /// Short label for logs and errors.
    pub fn label(&self) -> String {
        match self.args.first() {
            Some(script) => format!("{} {}", self.program, script),
            None => self.program.clone(),
        }
    }
}

/// Errors from running an external process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started at all.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exceeded its ceiling and was killed.
    #[error("{program} timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },

    /// I/O error while waiting on the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Runs `cmd` to completion, capturing stdout and stderr.
///
/// With `timeout = Some(d)` the child is killed once `d` elapses and
/// [`ProcessError::Timeout`] is returned.
pub async fn run_with_timeout(
    mut cmd: Command,
    label: &str,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, ProcessError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: label.to_string(),
        source,
    })?;

    let stdout_task = child.stdout.take().map(|mut out| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        })
    });
    let stderr_task = child.stderr.take().map(|mut err| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(ProcessError::Timeout {
                    program: label.to_string(),
                    timeout_secs: limit.as_secs(),
                });
            }
        },
        None => child.wait().await?,
    };

    let stdout = match stdout_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}
