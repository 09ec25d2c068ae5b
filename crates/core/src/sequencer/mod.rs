//! The per-job stage sequencer.
//!
//! Stages, in order: create manifest, link conversion, target discovery,
//! enrichment, normalization, finalization, acquisition. Resolution problems
//! skip the job; manifest or acquisition problems fail it.

mod config;
mod runner;
mod stages;
mod types;

pub use config::StageConfig;
pub use runner::{JobProcessor, StageSequencer};
pub use stages::{fallback_query, finalize, is_direct_locator, normalize};
pub use types::{JobOutcome, SequencerError, Stage};
