//! Worker pool implementation.
//!
//! Runs `C` pullers over the shared [`LinkQueue`]. Each puller claims the
//! next job, runs it to a terminal status on its own task, and claims again
//! until the batch is exhausted. A job that errors or panics is reported and
//! never affects its siblings.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::events::{EventSink, JobStatus, PipelineEvent};
use crate::metrics;
use crate::sequencer::{JobOutcome, JobProcessor};

use super::concurrency::{compute_concurrency, ConcurrencyInfo, SystemResources};
use super::config::OrchestratorConfig;
use super::queue::{Job, LinkQueue};
use super::types::{BatchSummary, OrchestratorError, OrchestratorStatus};

#[derive(Debug, Default)]
struct Counters {
    active: AtomicUsize,
    completed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn reset(&self) {
        self.completed.store(0, Ordering::SeqCst);
        self.skipped.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
    }

    fn record(&self, status: JobStatus) {
        let counter = match status {
            JobStatus::Completed => &self.completed,
            JobStatus::Skipped => &self.skipped,
            JobStatus::Error => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn summary(&self, total: usize) -> BatchSummary {
        BatchSummary {
            total,
            completed: self.completed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Clears the running flag however the batch ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Completed => "completed",
        JobStatus::Skipped => "skipped",
        JobStatus::Error => "error",
    }
}

/// The pipeline orchestrator.
pub struct Orchestrator {
    config: OrchestratorConfig,
    queue: Arc<LinkQueue>,
    processor: Arc<dyn JobProcessor>,
    events: EventSink,
    resources: SystemResources,
    running: AtomicBool,
    counters: Arc<Counters>,
}

impl Orchestrator {
    /// Create a new orchestrator sized from the detected host resources.
    pub fn new(
        config: OrchestratorConfig,
        queue: Arc<LinkQueue>,
        processor: Arc<dyn JobProcessor>,
        events: EventSink,
    ) -> Self {
        Self::with_resources(config, queue, processor, events, SystemResources::detect())
    }

    pub fn with_resources(
        config: OrchestratorConfig,
        queue: Arc<LinkQueue>,
        processor: Arc<dyn JobProcessor>,
        events: EventSink,
        resources: SystemResources,
    ) -> Self {
        Self {
            config,
            queue,
            processor,
            events,
            resources,
            running: AtomicBool::new(false),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn queue(&self) -> &Arc<LinkQueue> {
        &self.queue
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Pool size the next batch will use.
    pub fn concurrency(&self) -> usize {
        compute_concurrency(self.config.concurrency, &self.resources)
    }

    pub fn concurrency_info(&self) -> ConcurrencyInfo {
        ConcurrencyInfo::new(self.config.concurrency, &self.resources)
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            running: self.is_running(),
            queued: self.queue.len(),
            active: self.counters.active.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            skipped: self.counters.skipped.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            concurrency: self.concurrency(),
        }
    }

    /// Appends `jobs` to the queue and runs everything queued as one batch.
    pub async fn run(&self, jobs: Vec<Job>) -> Result<BatchSummary, OrchestratorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Batch already running");
            return Err(OrchestratorError::AlreadyRunning);
        }
        Ok(self.run_batch(jobs).await)
    }

    /// Runs whatever the queue currently holds.
    pub async fn run_queued(&self) -> Result<BatchSummary, OrchestratorError> {
        self.run(Vec::new()).await
    }

    /// Starts a batch of the queued links on a background task.
    ///
    /// The running flag is claimed before this returns, so a second call
    /// fails with [`OrchestratorError::AlreadyRunning`] immediately.
    pub fn spawn_queued(self: &Arc<Self>) -> Result<JoinHandle<BatchSummary>, OrchestratorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::AlreadyRunning);
        }
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.run_batch(Vec::new()).await }))
    }

    /// Body of a batch. The caller has claimed the running flag.
    async fn run_batch(&self, jobs: Vec<Job>) -> BatchSummary {
        let _guard = RunningGuard(&self.running);
        self.counters.reset();

        let total = self.queue.begin_batch(jobs);
        let concurrency = self.concurrency();
        info!(
            "Starting batch of {} link(s) with concurrency {}",
            total, concurrency
        );
        self.events.log(
            None,
            format!("Processing {} link(s), {} at a time", total, concurrency),
        );

        let mut pullers = JoinSet::new();
        for slot in 0..concurrency {
            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            let events = self.events.clone();
            let counters = Arc::clone(&self.counters);
            pullers.spawn(async move {
                pull_jobs(slot, queue, processor, events, counters).await;
            });
        }
        while let Some(joined) = pullers.join_next().await {
            if let Err(e) = joined {
                error!("Puller task ended abnormally: {}", e);
            }
        }

        self.queue.end_batch();
        let summary = self.counters.summary(total);
        info!(
            "Batch complete: {} completed, {} skipped, {} failed of {}",
            summary.completed, summary.skipped, summary.failed, summary.total
        );
        self.events.emit(PipelineEvent::BatchComplete { summary });
        summary
    }
}

async fn pull_jobs(
    slot: usize,
    queue: Arc<LinkQueue>,
    processor: Arc<dyn JobProcessor>,
    events: EventSink,
    counters: Arc<Counters>,
) {
    while let Some((job, current, total)) = queue.claim_next() {
        debug!("Puller {} claimed {} ({}/{})", slot, job.url, current, total);
        events.emit(PipelineEvent::BatchProgress { current, total });

        counters.active.fetch_add(1, Ordering::SeqCst);
        metrics::ACTIVE_PIPELINES.inc();

        let status = run_isolated(&processor, &job, &events).await;

        counters.active.fetch_sub(1, Ordering::SeqCst);
        metrics::ACTIVE_PIPELINES.dec();
        counters.record(status);
        metrics::JOBS_TOTAL
            .with_label_values(&[status_label(status)])
            .inc();

        events.emit(PipelineEvent::JobStatus {
            id: job.url.clone(),
            status,
        });
    }
    debug!("Puller {} finished", slot);
}

/// Runs one job on its own task so an error or a panic stays with that job.
async fn run_isolated(processor: &Arc<dyn JobProcessor>, job: &Job, events: &EventSink) -> JobStatus {
    let task_processor = Arc::clone(processor);
    let task_job = job.clone();
    let handle = tokio::spawn(async move { task_processor.process(&task_job).await });

    match handle.await {
        Ok(Ok(JobOutcome::Completed)) => {
            events.log(Some(&job.id), format!("Finished {}", job.url));
            JobStatus::Completed
        }
        Ok(Ok(JobOutcome::Skipped { reason })) => {
            events.log(Some(&job.id), format!("Skipped {}: {}", job.url, reason));
            JobStatus::Skipped
        }
        Ok(Err(e)) => {
            error!("[{}] Pipeline failed for {}: {}", job.id, job.url, e);
            events.log(Some(&job.id), format!("Error: {}", e));
            JobStatus::Error
        }
        Err(e) => {
            error!("[{}] Pipeline task aborted for {}: {}", job.id, job.url, e);
            events.log(Some(&job.id), "Error: pipeline crashed");
            JobStatus::Error
        }
    }
}
