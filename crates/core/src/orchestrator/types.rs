//! Types for the orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A batch is already in progress.
    #[error("a batch is already running")]
    AlreadyRunning,
}

/// Outcome counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether a batch is running.
    pub running: bool,
    /// Links waiting in the queue.
    pub queued: usize,
    /// Pipelines currently in flight.
    pub active: usize,
    /// Outcomes of the current (or last) batch.
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Pool size a batch would use.
    pub concurrency: usize,
}
