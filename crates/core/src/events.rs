//! Orchestrator events broadcast to observers (WebSocket clients, tests).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::orchestrator::BatchSummary;

/// Terminal status of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Skipped,
    Completed,
    Error,
}

/// Events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A log line, attributed to a job when one is known.
    Log {
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
        line: String,
    },
    /// A job was admitted from the queue.
    BatchProgress { current: usize, total: usize },
    /// A job reached its terminal status. `id` is the job's source URL.
    JobStatus { id: String, status: JobStatus },
    /// Transfer progress relayed from the acquisition worker.
    FileProgress { job_id: String, value: f32 },
    /// Every job in the batch has finished.
    BatchComplete { summary: BatchSummary },
}

/// Broadcast sink for [`PipelineEvent`]s.
///
/// Sending never blocks; events are dropped when nobody is subscribed.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    /// Logs `line` at info and forwards it as a `Log` event.
    pub fn log(&self, job_id: Option<&str>, line: impl Into<String>) {
        let line = line.into();
        match job_id {
            Some(id) => info!("[{}] {}", id, line),
            None => info!("{}", line),
        }
        self.emit(PipelineEvent::Log {
            job_id: job_id.map(str::to_string),
            line,
        });
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(256)
    }
}
