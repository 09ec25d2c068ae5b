use std::path::PathBuf;
use thiserror::Error;

use crate::manifest::ManifestError;
use crate::protocol::ProtocolError;

/// Errors from the acquisition worker and its launchers.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The manifest lacks a field the worker needs.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("cannot create download directory {}: {source}", path.display())]
    DownloadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the channel while the worker was waiting on it.
    #[error("worker channel closed")]
    ChannelClosed,

    #[error("failed to spawn worker {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The worker reported a fatal error.
    #[error("worker error: {0}")]
    Worker(String),

    /// The worker exited unsuccessfully.
    #[error("worker exited with {}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    WorkerExit { code: Option<i32> },

    #[error("acquisition timed out after {0}s")]
    Timeout(u64),

    #[error("fetch tool not found: {0}")]
    ToolNotFound(String),

    #[error("fetch tool download failed: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for AcquisitionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Download(err.to_string())
    }
}
