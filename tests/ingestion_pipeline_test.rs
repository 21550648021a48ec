mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use parking_lot::Mutex;
use ray_aggregator::aggregation::{AddOutcome, ReportSink, SessionReport};
use ray_aggregator::error::{ArchiveError, IngestError};
use ray_aggregator::ingestion::{Archiver, DirectoryArchiver, IngestionPipeline, IngestionReader};
use ray_aggregator::scheduler::DeadlineScheduler;
use ray_aggregator::{CompletionReason, Record, SessionRegistry};
use tempfile::TempDir;
use tokio::runtime::Handle;

struct Fixture {
    _root: TempDir,
    watch_dir: PathBuf,
    archive_dir: PathBuf,
    pipeline: IngestionPipeline,
    registry: Arc<SessionRegistry>,
    sink: Arc<CollectingSink>,
}

fn fixture(max_attempts: u32, backoff: Duration) -> Fixture {
    let root = TempDir::new().unwrap();
    let watch_dir = root.path().join("JSON");
    let archive_dir = root.path().join("ARCHIVED_JSON");
    std::fs::create_dir_all(&watch_dir).unwrap();

    let (registry, sink) = test_registry(Duration::from_secs(30), 3);
    let pipeline = IngestionPipeline::new(
        IngestionReader::new(max_attempts, backoff),
        Arc::clone(&registry),
        Arc::new(DirectoryArchiver::new(&archive_dir)),
    );

    Fixture {
        _root: root,
        watch_dir,
        archive_dir,
        pipeline,
        registry,
        sink,
    }
}

fn archived(dir: &Path, name: &str) -> bool {
    dir.join(name).exists()
}

#[tokio::test]
async fn test_complete_job_through_pipeline() {
    let fx = fixture(3, Duration::from_millis(20));

    for (file, ray) in [("b.json", "Dev_RayId_002"), ("a.json", "Dev_RayId_001")] {
        let path = write_artifact(&fx.watch_dir, file, &artifact("Dev_JobId_001", ray, "Success", 2));
        fx.pipeline.process_artifact(&path).await.unwrap();
    }

    let reports = fx.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].completion, CompletionReason::CountComplete);
    assert_eq!(reports[0].entries[0].sub_id, "Dev_RayId_001");
    assert!(archived(&fx.archive_dir, "a.json"));
    assert!(archived(&fx.archive_dir, "b.json"));
    assert_eq!(fx.pipeline.stats().ingested, 2);
}

#[tokio::test]
async fn test_artifact_archived_before_session_finalizes() {
    let fx = fixture(3, Duration::from_millis(20));
    let path = write_artifact(&fx.watch_dir, "r1.json", &artifact("job", "R1", "Success", 2));

    let outcome = fx.pipeline.process_artifact(&path).await.unwrap();

    assert_eq!(outcome.key, "job");
    assert_eq!(
        outcome.dispatch.map(|d| d.outcome),
        Some(AddOutcome::Accepted { remaining: 1 })
    );
    assert_eq!(outcome.archived_to, Some(fx.archive_dir.join("r1.json")));
    assert!(!path.exists());
    assert_eq!(fx.sink.count(), 0);
    assert!(fx.registry.contains("job"));
}

#[tokio::test]
async fn test_unreadable_artifact_is_abandoned_in_place() {
    let fx = fixture(3, Duration::from_millis(10));
    let path = fx.watch_dir.join("broken.json");
    std::fs::write(&path, "{ \"jobInfo\": { \"referenceIdentifier\": ").unwrap();

    let err = fx.pipeline.process_artifact(&path).await.unwrap_err();

    match err {
        IngestError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert!(path.exists());
    assert!(!archived(&fx.archive_dir, "broken.json"));
    assert_eq!(fx.registry.active_count(), 0);
    assert_eq!(fx.registry.stats().sessions_created, 0);
    assert_eq!(fx.pipeline.stats().abandoned, 1);
    assert_eq!(fx.pipeline.stats().ingested, 0);
}

#[tokio::test]
async fn test_missing_reference_is_abandoned_without_retry() {
    let fx = fixture(5, Duration::from_secs(5));
    let mut document = artifact("job", "R1", "Success", 1);
    document["jobInfo"]
        .as_object_mut()
        .unwrap()
        .remove("referenceIdentifier");
    let path = write_artifact(&fx.watch_dir, "nokey.json", &document);

    let started = std::time::Instant::now();
    let err = fx.pipeline.process_artifact(&path).await.unwrap_err();

    assert!(matches!(err, IngestError::MissingKey));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(path.exists());
    assert_eq!(fx.pipeline.stats().abandoned, 1);
}

#[tokio::test]
async fn test_half_written_artifact_is_picked_up_on_retry() {
    let fx = fixture(5, Duration::from_millis(100));
    let full = artifact("job", "R1", "Success", 1).to_string();
    let path = fx.watch_dir.join("slow.json");
    std::fs::write(&path, &full[..full.len() / 3]).unwrap();

    let finisher = {
        let path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            tokio::fs::write(&path, full).await.unwrap();
        })
    };

    let outcome = fx.pipeline.process_artifact(&path).await.unwrap();
    finisher.await.unwrap();

    assert_eq!(outcome.sub_id, "R1");
    assert_eq!(fx.sink.count(), 1);
    assert!(archived(&fx.archive_dir, "slow.json"));
}

#[tokio::test]
async fn test_vanished_artifact_exhausts_attempts() {
    let fx = fixture(2, Duration::from_millis(10));

    let err = fx
        .pipeline
        .process_artifact(&fx.watch_dir.join("gone.json"))
        .await
        .unwrap_err();

    assert!(err.is_abandoned());
    assert_eq!(fx.registry.stats().sessions_created, 0);
}

/// Archiver whose storage is always unavailable
struct UnavailableArchiver;

#[async_trait]
impl Archiver for UnavailableArchiver {
    async fn archive(&self, path: &Path) -> Result<PathBuf, ArchiveError> {
        Err(ArchiveError::InvalidPath(path.to_path_buf()))
    }
}

#[tokio::test]
async fn test_archive_failure_keeps_aggregation() {
    let root = TempDir::new().unwrap();
    let watch_dir = root.path().join("JSON");
    let (registry, sink) = test_registry(Duration::from_secs(30), 3);
    let pipeline = IngestionPipeline::new(
        IngestionReader::new(3, Duration::from_millis(10)),
        Arc::clone(&registry),
        Arc::new(UnavailableArchiver),
    );

    let path = write_artifact(&watch_dir, "r1.json", &artifact("job", "R1", "Success", 1));
    let outcome = pipeline.process_artifact(&path).await.unwrap();

    assert_eq!(outcome.archived_to, None);
    assert_eq!(outcome.dispatch.map(|d| d.outcome), Some(AddOutcome::Completed));
    assert!(path.exists());

    let stats = pipeline.stats();
    assert_eq!(stats.ingested, 1);
    assert_eq!(stats.archive_failures, 1);
    assert_eq!(stats.routing_failures, 0);

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].entries[0].sub_id, "R1");
}

/// Sink that parks inside `deliver` until the test releases `gate`, which
/// keeps the finalizing session registered under its key
#[derive(Default)]
struct GatedSink {
    gate: Mutex<()>,
    entered: AtomicBool,
}

impl ReportSink for GatedSink {
    fn deliver(&self, _report: &SessionReport) {
        self.entered.store(true, Ordering::SeqCst);
        let _open = self.gate.lock();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unroutable_record_is_still_archived() {
    let root = TempDir::new().unwrap();
    let watch_dir = root.path().join("JSON");
    let archive_dir = root.path().join("ARCHIVED_JSON");

    let sink = Arc::new(GatedSink::default());
    let registry = Arc::new(SessionRegistry::new(
        DeadlineScheduler::new(Handle::current()),
        sink.clone(),
        Duration::from_secs(30),
        0,
    ));
    let pipeline = Arc::new(IngestionPipeline::new(
        IngestionReader::new(3, Duration::from_millis(10)),
        Arc::clone(&registry),
        Arc::new(DirectoryArchiver::new(&archive_dir)),
    ));

    let gate = sink.gate.lock();
    let finalizing = {
        let registry = Arc::clone(&registry);
        tokio::task::spawn_blocking(move || registry.dispatch(Record::new("job", "R1", "Success", 1)))
    };
    let entered = Arc::clone(&sink);
    assert!(wait_until(Duration::from_secs(5), || entered.entered.load(Ordering::SeqCst)).await);
    assert!(registry.contains("job"));

    let path = write_artifact(&watch_dir, "late.json", &artifact("job", "R2", "Success", 1));
    let late = {
        let pipeline = Arc::clone(&pipeline);
        let path = path.clone();
        tokio::spawn(async move { pipeline.process_artifact(&path).await })
    };

    // Let the late record reach the finalizing session before it lets go
    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(gate);

    let first = finalizing.await.unwrap().unwrap();
    assert_eq!(first.outcome, AddOutcome::Completed);

    let outcome = late.await.unwrap().unwrap();
    assert_eq!(outcome.sub_id, "R2");
    assert_eq!(outcome.dispatch, None);
    assert_eq!(outcome.archived_to, Some(archive_dir.join("late.json")));
    assert!(!path.exists());

    let stats = pipeline.stats();
    assert_eq!(stats.ingested, 1);
    assert_eq!(stats.routing_failures, 1);
    assert_eq!(stats.archive_failures, 0);
    assert!(!registry.contains("job"));
}
