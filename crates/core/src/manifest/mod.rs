//! Per-job manifest documents.
//!
//! A manifest is the only state shared between the orchestrator, the
//! external collaborators and the acquisition worker. Every write is a
//! read-merge-write so fields written by other processes survive.

mod merge;
mod store;
mod types;

pub use merge::{merge_shallow, merged};
pub use store::{
    delete, new_session_id, patch, read_manifest, read_raw, update, write_manifest, write_raw,
    ManifestStore,
};
pub use types::{Manifest, ManifestStatus, Query, TrackEntry, TrackStatus};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from manifest persistence.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No manifest at the given path.
    #[error("manifest not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file is not a valid manifest document.
    #[error("invalid manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The manifest could not be serialized.
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ManifestError {
    pub(crate) fn parse(path: &Path, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            source,
        }
    }
}
