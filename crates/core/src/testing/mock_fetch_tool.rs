//! Mock fetch tool for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::acquisition::{FetchError, FetchTool};

/// Scripted result of one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok,
    Fail(String),
}

impl FetchOutcome {
    pub fn ok() -> Self {
        Self::Ok
    }

    pub fn fail(diagnostic: impl Into<String>) -> Self {
        Self::Fail(diagnostic.into())
    }
}

/// Mock implementation of the FetchTool trait.
///
/// Outcomes are scripted per unit title: an attempt whose `-o` output path
/// contains the title takes the next scripted outcome. Unscripted attempts
/// succeed.
///
/// # Example
///
/// ```rust,ignore
/// let tool = MockFetchTool::new();
/// tool.script("Track 2", vec![FetchOutcome::fail("HTTP Error 403"), FetchOutcome::ok()]).await;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockFetchTool {
    scripts: Arc<RwLock<HashMap<String, VecDeque<FetchOutcome>>>>,
    calls: Arc<RwLock<Vec<Vec<String>>>>,
    updates: Arc<RwLock<usize>>,
}

impl MockFetchTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for attempts on the unit titled `title`.
    pub async fn script(&self, title: impl Into<String>, outcomes: Vec<FetchOutcome>) {
        self.scripts
            .write()
            .await
            .insert(title.into(), outcomes.into_iter().collect());
    }

    /// Argument lists of every attempt, in order.
    pub async fn recorded_calls(&self) -> Vec<Vec<String>> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Attempts whose output path contains `title`.
    pub async fn calls_for(&self, title: &str) -> Vec<Vec<String>> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|args| output_arg(args).is_some_and(|o| o.contains(title)))
            .cloned()
            .collect()
    }

    pub async fn update_count(&self) -> usize {
        *self.updates.read().await
    }
}

fn output_arg(args: &[String]) -> Option<&str> {
    args.iter()
        .position(|a| a == "-o")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[async_trait]
impl FetchTool for MockFetchTool {
    async fn fetch(
        &self,
        args: &[String],
        progress: mpsc::UnboundedSender<f32>,
    ) -> Result<(), FetchError> {
        self.calls.write().await.push(args.to_vec());

        let output = output_arg(args).unwrap_or_default().to_string();
        let outcome = {
            let mut scripts = self.scripts.write().await;
            scripts
                .iter_mut()
                .find(|(title, _)| output.contains(title.as_str()))
                .and_then(|(_, queue)| queue.pop_front())
                .unwrap_or(FetchOutcome::Ok)
        };

        let _ = progress.send(50.0);
        match outcome {
            FetchOutcome::Ok => {
                let _ = progress.send(100.0);
                Ok(())
            }
            FetchOutcome::Fail(diagnostic) => Err(FetchError::Failed {
                code: Some(1),
                diagnostic,
            }),
        }
    }

    async fn self_update(&self) -> Result<(), FetchError> {
        *self.updates.write().await += 1;
        Ok(())
    }
}
