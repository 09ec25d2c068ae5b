//! End-to-end pipeline tests.
//!
//! These run real stage sequencers and a real acquisition worker (over an
//! in-memory channel) with scripted collaborators and fetch tool.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Mutex;

use ripline_core::{
    acquisition::{AcquisitionWorker, InProcessLauncher},
    manifest::{self, TrackStatus},
    testing::{
        fixtures, FetchOutcome, MockFetchTool, MockLinkConverter, MockRefresher,
        MockTargetDiscovery,
    },
    AcquisitionContext, AcquisitionError, AcquisitionLauncher, AcquisitionReport, EventSink,
    FetchConfig, JobStatus, LinkQueue, Manifest, ManifestStatus, ManifestStore, Orchestrator,
    OrchestratorConfig, PipelineEvent, StageConfig, StageSequencer,
};

const PLAYLIST: &str = "https://www.youtube.com/playlist?list=OLAK5uy_fixture";
const EXPIRED: &str = "ERROR: [youtube] abc: HTTP Error 403: Forbidden";

/// Keeps a copy of each manifest as the worker left it, before the
/// sequencer deletes it.
struct SnapshotLauncher {
    inner: InProcessLauncher<MockFetchTool>,
    snapshots: Arc<Mutex<Vec<Manifest>>>,
}

#[async_trait]
impl AcquisitionLauncher for SnapshotLauncher {
    async fn acquire(
        &self,
        manifest_path: &Path,
        ctx: &AcquisitionContext,
    ) -> Result<AcquisitionReport, AcquisitionError> {
        let report = self.inner.acquire(manifest_path, ctx).await?;
        let snapshot = manifest::read_manifest(manifest_path).await?;
        self.snapshots.lock().await.push(snapshot);
        Ok(report)
    }
}

struct Pipeline {
    _dir: TempDir,
    store: ManifestStore,
    converter: MockLinkConverter,
    discovery: MockTargetDiscovery,
    tool: MockFetchTool,
    refresher: MockRefresher,
    events: EventSink,
    orchestrator: Arc<Orchestrator>,
    snapshots: Arc<Mutex<Vec<Manifest>>>,
}

impl Pipeline {
    async fn new(concurrency: usize) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = ManifestStore::new(dir.path().join("data"));
        let converter = MockLinkConverter::new();
        let discovery = MockTargetDiscovery::new();
        let tool = MockFetchTool::new();
        let refresher = MockRefresher::new();
        let events = EventSink::new(1024);

        converter
            .set_query(Some(fixtures::album_query("Portishead", "Dummy")))
            .await;
        converter
            .set_manifest_patch(json!({
                "tracklist": [
                    {"title": "Mysterons", "number": 1, "duration": "5:02"},
                    {"title": "Sour Times", "number": 2, "duration": "4:11"},
                    {"title": "Strangers", "number": 3, "duration": "3:58"},
                ]
            }))
            .await;
        discovery.set_result(Some(PLAYLIST.to_string())).await;

        let worker = AcquisitionWorker::new(tool.clone(), FetchConfig::default());
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let launcher = SnapshotLauncher {
            inner: InProcessLauncher::new(worker, Arc::new(refresher.clone())),
            snapshots: snapshots.clone(),
        };
        let sequencer = StageSequencer::new(
            StageConfig {
                manifest_settle_ms: 0,
                ..Default::default()
            },
            store.clone(),
            dir.path().join("music"),
            Arc::new(converter.clone()),
            Arc::new(discovery.clone()),
            Arc::new(launcher),
            events.clone(),
        );
        let orchestrator = Arc::new(Orchestrator::new(
            OrchestratorConfig {
                concurrency: Some(concurrency),
                ..Default::default()
            },
            Arc::new(LinkQueue::new()),
            Arc::new(sequencer),
            events.clone(),
        ));

        Self {
            _dir: dir,
            store,
            converter,
            discovery,
            tool,
            refresher,
            events,
            orchestrator,
            snapshots,
        }
    }
}

#[tokio::test]
async fn test_full_pipeline_acquires_every_track() {
    let p = Pipeline::new(1).await;
    let mut rx = p.events.subscribe();

    p.orchestrator.queue().push("https://open.spotify.com/album/dummy");
    let summary = p.orchestrator.run_queued().await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(p.tool.call_count().await, 3);
    assert_eq!(p.refresher.call_count().await, 0);
    assert!(p.store.list().await.unwrap().is_empty());

    // Each unit is fetched as its own playlist item.
    let calls = p.tool.calls_for("Sour Times").await;
    assert_eq!(calls.len(), 1);
    let item = calls[0].iter().position(|a| a == "--playlist-items").unwrap();
    assert_eq!(calls[0][item + 1], "2");

    let mut saw_progress = false;
    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, PipelineEvent::FileProgress { .. }) {
            saw_progress = true;
        }
        last = Some(event);
    }
    assert!(saw_progress);
    assert!(matches!(last, Some(PipelineEvent::BatchComplete { .. })));
}

#[tokio::test]
async fn test_expired_credentials_block_worker_until_refresh_done() {
    let p = Pipeline::new(1).await;
    p.tool
        .script(
            "Sour Times",
            vec![FetchOutcome::fail(EXPIRED), FetchOutcome::ok()],
        )
        .await;
    p.refresher.hold().await;

    p.orchestrator.queue().push("https://open.spotify.com/album/dummy");
    let batch = p.orchestrator.spawn_queued().unwrap();

    tokio::time::timeout(Duration::from_secs(5), p.refresher.wait_until_called())
        .await
        .expect("worker never asked for a refresh");

    // Unit 1 succeeded, unit 2 failed once; nothing runs while the refresh is open.
    assert_eq!(p.tool.call_count().await, 2);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(p.tool.call_count().await, 2);

    p.refresher.release();
    let summary = tokio::time::timeout(Duration::from_secs(5), batch)
        .await
        .expect("batch did not finish")
        .unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(p.refresher.call_count().await, 1);
    assert_eq!(p.tool.update_count().await, 1);
    assert_eq!(p.tool.call_count().await, 4);

    let retries = p.tool.calls_for("Sour Times").await;
    assert_eq!(retries.len(), 2);
    assert!(!retries[0].contains(&"--extractor-args".to_string()));
    assert!(retries[1].contains(&"--extractor-args".to_string()));

    // Units 1 and 3 were untouched by the refresh; unit 2 completed on retry.
    let snapshots = p.snapshots.lock().await;
    assert_eq!(snapshots.len(), 1);
    let acquired = &snapshots[0];
    assert_eq!(acquired.status, ManifestStatus::Acquired);
    let statuses: Vec<TrackStatus> = acquired.track_list().iter().map(|t| t.status).collect();
    assert_eq!(statuses, vec![TrackStatus::Completed; 3]);
    assert!(acquired.track_list()[1].error_message.is_none());
    assert!(acquired
        .track_list()
        .iter()
        .all(|t| t.local_file_path.is_some()));
    assert_eq!(p.tool.calls_for("Mysterons").await.len(), 1);
    assert_eq!(p.tool.calls_for("Strangers").await.len(), 1);
}

#[tokio::test]
async fn test_failed_unit_does_not_fail_job() {
    let p = Pipeline::new(1).await;
    p.tool
        .script(
            "Strangers",
            vec![FetchOutcome::fail("ERROR: Video unavailable")],
        )
        .await;

    p.orchestrator.queue().push("https://open.spotify.com/album/dummy");
    let summary = p.orchestrator.run_queued().await.unwrap();

    // A non-credential failure is not retried and is recorded per unit.
    assert_eq!(summary.completed, 1);
    assert_eq!(p.tool.calls_for("Strangers").await.len(), 1);
    assert_eq!(p.refresher.call_count().await, 0);
}

#[tokio::test]
async fn test_unresolvable_link_is_skipped_and_keeps_manifest() {
    let p = Pipeline::new(1).await;
    p.converter.set_query(None).await;
    p.converter.set_manifest_patch(json!({})).await;
    let mut rx = p.events.subscribe();

    p.orchestrator.queue().push("https://example.com/nothing");
    let summary = p.orchestrator.run_queued().await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(p.discovery.call_count().await, 0);
    assert_eq!(p.tool.call_count().await, 0);
    assert_eq!(p.store.list().await.unwrap().len(), 1);

    let mut status = None;
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::JobStatus { id, status: s } = event {
            assert_eq!(id, "https://example.com/nothing");
            status = Some(s);
        }
    }
    assert_eq!(status, Some(JobStatus::Skipped));
}

#[tokio::test]
async fn test_refresh_in_one_pipeline_does_not_stall_another() {
    let p = Pipeline::new(2).await;
    p.tool
        .script("Mysterons", vec![FetchOutcome::fail(EXPIRED), FetchOutcome::ok()])
        .await;
    p.refresher.hold().await;

    p.orchestrator.queue().push("https://open.spotify.com/album/one");
    p.orchestrator.queue().push("https://open.spotify.com/album/two");
    let batch = p.orchestrator.spawn_queued().unwrap();

    tokio::time::timeout(Duration::from_secs(5), p.refresher.wait_until_called())
        .await
        .expect("worker never asked for a refresh");

    // Only the first job to reach "Mysterons" draws the 403. It stays parked
    // while the other job's worker fetches all three of its units.
    tokio::time::timeout(Duration::from_secs(5), async {
        while p.tool.call_count().await < 4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("second pipeline stalled behind the refresh");
    assert_eq!(p.refresher.call_count().await, 1);

    p.refresher.release();
    let summary = tokio::time::timeout(Duration::from_secs(5), batch)
        .await
        .expect("batch did not finish")
        .unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.completed, 2);
    assert_eq!(p.tool.call_count().await, 7);
}
