//! Mock job processor for orchestrator tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::orchestrator::Job;
use crate::sequencer::{JobOutcome, JobProcessor, SequencerError};

/// How the mock handles a given URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorBehavior {
    #[default]
    Complete,
    Skip,
    Fail,
    Panic,
}

/// Mock implementation of the JobProcessor trait.
///
/// Tracks how many jobs run at once so tests can assert the pool bound.
#[derive(Debug, Clone, Default)]
pub struct MockJobProcessor {
    behaviors: Arc<RwLock<HashMap<String, ProcessorBehavior>>>,
    delay: Arc<RwLock<Duration>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    processed: Arc<RwLock<Vec<String>>>,
}

impl MockJobProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_behavior(&self, url: impl Into<String>, behavior: ProcessorBehavior) {
        self.behaviors.write().await.insert(url.into(), behavior);
    }

    /// Time each job takes.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Highest number of jobs observed running at once.
    pub fn peak_active(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// URLs in the order they were started.
    pub async fn processed(&self) -> Vec<String> {
        self.processed.read().await.clone()
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobProcessor for MockJobProcessor {
    async fn process(&self, job: &Job) -> Result<JobOutcome, SequencerError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(&self.active);
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.processed.write().await.push(job.url.clone());

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let behavior = self
            .behaviors
            .read()
            .await
            .get(&job.url)
            .copied()
            .unwrap_or_default();
        match behavior {
            ProcessorBehavior::Complete => Ok(JobOutcome::Completed),
            ProcessorBehavior::Skip => Ok(JobOutcome::skipped("mock skip")),
            ProcessorBehavior::Fail => Err(SequencerError::NoTracks),
            ProcessorBehavior::Panic => panic!("mock pipeline panic for {}", job.url),
        }
    }
}
