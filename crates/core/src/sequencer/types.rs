use std::fmt;
use thiserror::Error;

use crate::acquisition::AcquisitionError;
use crate::manifest::ManifestError;

/// Non-error end of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every unit was attempted and the manifest was removed.
    Completed,
    /// The job could not be resolved; nothing was fetched.
    Skipped { reason: String },
}

impl JobOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}

/// Unrecoverable per-job errors.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Normalization produced no units to fetch.
    #[error("manifest has no tracks to acquire")]
    NoTracks,

    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("acquisition timed out after {0}s")]
    AcquisitionTimeout(u64),
}

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CreateManifest,
    LinkConversion,
    TargetDiscovery,
    Enrichment,
    Normalization,
    Finalization,
    Acquisition,
}

impl Stage {
    pub const COUNT: usize = 7;

    /// 1-based position.
    pub fn number(&self) -> usize {
        match self {
            Self::CreateManifest => 1,
            Self::LinkConversion => 2,
            Self::TargetDiscovery => 3,
            Self::Enrichment => 4,
            Self::Normalization => 5,
            Self::Finalization => 6,
            Self::Acquisition => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateManifest => "create_manifest",
            Self::LinkConversion => "link_conversion",
            Self::TargetDiscovery => "target_discovery",
            Self::Enrichment => "enrichment",
            Self::Normalization => "normalization",
            Self::Finalization => "finalization",
            Self::Acquisition => "acquisition",
        }
    }

    /// `[n/7]` log prefix.
    pub fn prefix(&self) -> String {
        format!("[{}/{}]", self.number(), Self::COUNT)
    }
}
