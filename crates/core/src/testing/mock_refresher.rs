//! Mock credential refresher for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

use crate::credentials::{CredentialRefresher, RefreshError, RefreshOutcome};

/// Mock implementation of the CredentialRefresher trait.
///
/// Can be held closed so a test can observe a worker blocked on the
/// refresh handshake:
///
/// ```rust,ignore
/// let refresher = MockRefresher::new();
/// refresher.hold().await;
/// // ... start acquisition ...
/// refresher.wait_until_called().await;
/// // worker is blocked here
/// refresher.release();
/// ```
#[derive(Debug, Clone)]
pub struct MockRefresher {
    outcome: Arc<RwLock<RefreshOutcome>>,
    spawn_error: Arc<RwLock<bool>>,
    calls: Arc<RwLock<usize>>,
    gate: Arc<RwLock<Option<Arc<Notify>>>>,
    entered: Arc<Notify>,
}

impl Default for MockRefresher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRefresher {
    pub fn new() -> Self {
        Self::with_outcome(RefreshOutcome::Refreshed)
    }

    pub fn with_outcome(outcome: RefreshOutcome) -> Self {
        Self {
            outcome: Arc::new(RwLock::new(outcome)),
            spawn_error: Arc::new(RwLock::new(false)),
            calls: Arc::new(RwLock::new(0)),
            gate: Arc::new(RwLock::new(None)),
            entered: Arc::new(Notify::new()),
        }
    }

    pub async fn set_outcome(&self, outcome: RefreshOutcome) {
        *self.outcome.write().await = outcome;
    }

    /// Fail refreshes as if the exporter could not be started.
    pub async fn set_spawn_error(&self, fail: bool) {
        *self.spawn_error.write().await = fail;
    }

    /// Block refreshes until [`release`](Self::release) is called.
    pub async fn hold(&self) {
        *self.gate.write().await = Some(Arc::new(Notify::new()));
    }

    /// Let one held refresh finish.
    pub fn release(&self) {
        if let Ok(gate) = self.gate.try_read() {
            if let Some(notify) = gate.as_ref() {
                notify.notify_one();
            }
        }
    }

    /// Wait for the next refresh to begin.
    pub async fn wait_until_called(&self) {
        self.entered.notified().await;
    }

    pub async fn call_count(&self) -> usize {
        *self.calls.read().await
    }
}

#[async_trait]
impl CredentialRefresher for MockRefresher {
    async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        *self.calls.write().await += 1;
        self.entered.notify_one();

        let gate = self.gate.read().await.clone();
        if let Some(notify) = gate {
            notify.notified().await;
        }

        if *self.spawn_error.read().await {
            return Err(RefreshError::Spawn {
                program: "mock-exporter".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            });
        }
        Ok(*self.outcome.read().await)
    }
}
