//! Orchestrator lifecycle integration tests.
//!
//! These exercise the queue and the bounded pool with a scripted job
//! processor: admission order, concurrency bound, per-job isolation and the
//! batch event stream.

use std::sync::Arc;
use std::time::Duration;

use ripline_core::{
    orchestrator::SystemResources,
    testing::{MockJobProcessor, ProcessorBehavior},
    EventSink, JobStatus, LinkQueue, Orchestrator, OrchestratorConfig, OrchestratorError,
    PipelineEvent,
};

struct TestHarness {
    processor: MockJobProcessor,
    events: EventSink,
    orchestrator: Arc<Orchestrator>,
}

impl TestHarness {
    fn new(concurrency: Option<usize>) -> Self {
        let processor = MockJobProcessor::new();
        let events = EventSink::new(1024);
        let orchestrator = Arc::new(Orchestrator::with_resources(
            OrchestratorConfig {
                concurrency,
                ..Default::default()
            },
            Arc::new(LinkQueue::new()),
            Arc::new(processor.clone()),
            events.clone(),
            SystemResources::new(8, 16.0),
        ));
        Self {
            processor,
            events,
            orchestrator,
        }
    }

    fn push_all(&self, urls: &[&str]) {
        for url in urls {
            self.orchestrator.queue().push(*url);
        }
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn test_three_links_two_at_a_time() {
    let h = TestHarness::new(Some(2));
    h.processor.set_delay(Duration::from_millis(50)).await;
    let mut rx = h.events.subscribe();

    h.push_all(&["https://a", "https://b", "https://c"]);
    let summary = h.orchestrator.run_queued().await.unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.completed, 3);
    assert_eq!(h.processor.peak_active(), 2);
    let mut processed = h.processor.processed().await;
    processed.sort();
    assert_eq!(processed, vec!["https://a", "https://b", "https://c"]);

    let events = drain(&mut rx);
    let progress: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::BatchProgress { current, total } => Some((*current, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

    let statuses = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::JobStatus { .. }))
        .count();
    assert_eq!(statuses, 3);

    match events.last() {
        Some(PipelineEvent::BatchComplete { summary: s }) => assert_eq!(*s, summary),
        other => panic!("expected BatchComplete last, got {:?}", other),
    }
    assert!(h.orchestrator.queue().is_empty());
}

#[tokio::test]
async fn test_failures_and_panics_stay_with_their_job() {
    let h = TestHarness::new(Some(2));
    h.processor
        .set_behavior("https://boom", ProcessorBehavior::Panic)
        .await;
    h.processor
        .set_behavior("https://bad", ProcessorBehavior::Fail)
        .await;
    h.processor
        .set_behavior("https://meh", ProcessorBehavior::Skip)
        .await;
    let mut rx = h.events.subscribe();

    h.push_all(&["https://boom", "https://bad", "https://meh", "https://ok"]);
    let summary = h.orchestrator.run_queued().await.unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 2);

    let statuses: Vec<(String, JobStatus)> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::JobStatus { id, status } => Some((id, status)),
            _ => None,
        })
        .collect();
    assert!(statuses.contains(&("https://boom".to_string(), JobStatus::Error)));
    assert!(statuses.contains(&("https://bad".to_string(), JobStatus::Error)));
    assert!(statuses.contains(&("https://meh".to_string(), JobStatus::Skipped)));
    assert!(statuses.contains(&("https://ok".to_string(), JobStatus::Completed)));
}

#[tokio::test]
async fn test_second_batch_rejected_while_running() {
    let h = TestHarness::new(Some(1));
    h.processor.set_delay(Duration::from_millis(100)).await;

    h.push_all(&["https://slow"]);
    let first = h.orchestrator.spawn_queued().unwrap();
    assert!(h.orchestrator.is_running());

    let second = h.orchestrator.run_queued().await;
    assert!(matches!(second, Err(OrchestratorError::AlreadyRunning)));

    let summary = first.await.unwrap();
    assert_eq!(summary.completed, 1);
    assert!(!h.orchestrator.is_running());
}

#[tokio::test]
async fn test_empty_batch_completes_immediately() {
    let h = TestHarness::new(None);
    let mut rx = h.events.subscribe();

    let summary = h.orchestrator.run_queued().await.unwrap();
    assert_eq!(summary.total, 0);

    let events = drain(&mut rx);
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::BatchComplete { .. })
    ));
    assert_eq!(h.processor.peak_active(), 0);
}

#[tokio::test]
async fn test_auto_concurrency_uses_host_resources() {
    let h = TestHarness::new(None);
    let info = h.orchestrator.concurrency_info();

    assert_eq!(info.cpu_count, 8);
    assert_eq!(info.user_value, None);
    assert_eq!(info.effective, info.recommended);
    assert!(info.effective >= 1 && info.effective <= info.max);
}
