//! The link queue and its batch cursor.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// One submitted link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Short correlation id used in logs.
    pub id: String,
    pub url: String,
    pub queue_position: usize,
}

impl Job {
    pub fn new(url: impl Into<String>, queue_position: usize) -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self {
            id,
            url: url.into(),
            queue_position,
        }
    }
}

#[derive(Debug, Default)]
struct BatchCursor {
    total: usize,
    claimed: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    next_position: usize,
    batch: Option<BatchCursor>,
}

impl QueueState {
    /// Unclaimed jobs of the running batch, always at the front.
    fn reserved(&self) -> usize {
        self.batch
            .as_ref()
            .map_or(0, |cursor| cursor.total - cursor.claimed)
    }
}

/// Ordered links waiting to run.
///
/// The deque and the batch cursor share one lock, so claiming a job and
/// advancing the cursor happen together.
#[derive(Debug, Default)]
pub struct LinkQueue {
    state: Mutex<QueueState>,
}

impl LinkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends a link and returns the queued job.
    pub fn push(&self, url: impl Into<String>) -> Job {
        let mut state = self.lock();
        let job = Job::new(url, state.next_position);
        state.next_position += 1;
        state.jobs.push_back(job.clone());
        job
    }

    /// Removes every queued job with this URL. Returns how many were removed.
    ///
    /// Jobs already admitted to a running batch are kept.
    pub fn remove_url(&self, url: &str) -> usize {
        let mut state = self.lock();
        let reserved = state.reserved();
        let before = state.jobs.len();
        let mut index = 0;
        state.jobs.retain(|j| {
            let keep = index < reserved || j.url != url;
            index += 1;
            keep
        });
        before - state.jobs.len()
    }

    /// Drops every queued job outside a running batch. Returns how many
    /// were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let reserved = state.reserved();
        let dropped = state.jobs.len().saturating_sub(reserved);
        state.jobs.truncate(reserved);
        dropped
    }

    pub fn snapshot(&self) -> Vec<Job> {
        self.lock().jobs.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `jobs` and fixes the batch to everything now queued.
    /// Returns the batch size.
    pub fn begin_batch(&self, jobs: Vec<Job>) -> usize {
        let mut state = self.lock();
        for mut job in jobs {
            job.queue_position = state.next_position;
            state.next_position += 1;
            state.jobs.push_back(job);
        }
        let total = state.jobs.len();
        state.batch = Some(BatchCursor { total, claimed: 0 });
        total
    }

    /// Pops the next job of the running batch with its 1-based admission
    /// index and the batch size.
    pub fn claim_next(&self) -> Option<(Job, usize, usize)> {
        let mut state = self.lock();
        let (claimed, total) = match state.batch.as_ref() {
            Some(cursor) if cursor.claimed < cursor.total => (cursor.claimed, cursor.total),
            _ => return None,
        };
        let job = state.jobs.pop_front()?;
        if let Some(cursor) = state.batch.as_mut() {
            cursor.claimed = claimed + 1;
        }
        Some((job, claimed + 1, total))
    }

    /// Closes the batch and clears the queue.
    pub fn end_batch(&self) {
        let mut state = self.lock();
        state.batch = None;
        state.jobs.clear();
    }
}
