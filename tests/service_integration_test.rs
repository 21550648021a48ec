mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use ray_aggregator::submission::{build_document, BatchSpec, SubmissionWriter};
use ray_aggregator::{format_report, AggregatorService, CompletionReason};
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_service_reports_completed_job() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let archive_dir = config.archive.directory.clone();
    let writer = SubmissionWriter::new(&config.watch.directory);

    let service = Arc::new(AggregatorService::from_config(config).unwrap());
    let mut reports = service.publisher().subscribe();
    let mut handle = Arc::clone(&service).start().await;

    let spec = BatchSpec::default().with_jobs(1).with_rays_per_job(3);
    for ray in [3, 1, 2] {
        let document = serde_json::to_value(build_document(&spec, 1, ray)).unwrap();
        writer
            .write_atomically(&format!("Dev_RayId_{ray:03}.json"), &document)
            .await
            .unwrap();
    }

    let published = tokio::time::timeout(Duration::from_secs(10), reports.recv())
        .await
        .expect("report within timeout")
        .unwrap();

    let report = published.report;
    assert_eq!(report.key, "Dev_JobId_001");
    assert_eq!(report.completion, CompletionReason::CountComplete);
    let rays: Vec<&str> = report.entries.iter().map(|e| e.sub_id.as_str()).collect();
    assert_eq!(rays, vec!["Dev_RayId_001", "Dev_RayId_002", "Dev_RayId_003"]);
    assert!(format_report(&report).ends_with("Total ray_ids processed for refId Dev_JobId_001: 3 of 3 expected"));

    assert!(
        wait_until(Duration::from_secs(5), || {
            std::fs::read_dir(&archive_dir).map(|d| d.count()).unwrap_or(0) == 3
        })
        .await
    );

    handle.stop().await.unwrap();
    assert!(!handle.is_running());
    let status = service.status();
    assert_eq!(status.ingest.ingested, 3);
    assert_eq!(status.registry.active, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_flushes_open_sessions() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let watch_dir = config.watch.directory.clone();

    let service = Arc::new(AggregatorService::from_config(config).unwrap());
    let mut reports = service.publisher().subscribe();
    let mut handle = Arc::clone(&service).start().await;

    write_artifact(&watch_dir, "r1.json", &artifact("Dev_JobId_002", "Dev_RayId_008", "Success", 7));

    let registry = Arc::clone(service.registry());
    assert!(wait_until(Duration::from_secs(5), || registry.contains("Dev_JobId_002")).await);

    handle.stop().await.unwrap();

    let report = reports.try_recv().unwrap().report;
    assert_eq!(report.completion, CompletionReason::Shutdown);
    assert_eq!(report.total, 1);
    assert!(report.is_partial());
    assert_eq!(service.registry().active_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_artifact_is_counted() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let watch_dir = config.watch.directory.clone();

    let service = Arc::new(AggregatorService::from_config(config).unwrap());
    let mut handle = Arc::clone(&service).start().await;

    std::fs::create_dir_all(&watch_dir).unwrap();
    std::fs::write(watch_dir.join("broken.json"), "{").unwrap();

    let pipeline = Arc::clone(service.pipeline());
    assert!(wait_until(Duration::from_secs(5), || pipeline.stats().abandoned == 1).await);
    assert!(watch_dir.join("broken.json").exists());

    handle.stop().await.unwrap();
    assert_eq!(service.registry().stats().sessions_created, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_created_right_after_start_is_ingested() {
    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path());
    config.watch.process_existing = false;
    let watch_dir = config.watch.directory.clone();
    let archive_dir = config.archive.directory.clone();

    std::fs::create_dir_all(&watch_dir).unwrap();
    write_artifact(&watch_dir, "stale.json", &artifact("Dev_JobId_009", "Dev_RayId_001", "Success", 2));

    let service = Arc::new(AggregatorService::from_config(config).unwrap());
    let mut handle = Arc::clone(&service).start().await;

    write_artifact(&watch_dir, "fresh.json", &artifact("Dev_JobId_009", "Dev_RayId_002", "Success", 2));

    let pipeline = Arc::clone(service.pipeline());
    assert!(wait_until(Duration::from_secs(5), || pipeline.stats().ingested == 1).await);
    assert!(wait_until(Duration::from_secs(5), || archive_dir.join("fresh.json").exists()).await);

    // Give the watcher a few more polls to prove the old file stays ignored
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.stop().await.unwrap();

    assert_eq!(service.status().ingest.ingested, 1);
    assert!(watch_dir.join("stale.json").exists());
    assert!(!archive_dir.join("stale.json").exists());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path());
    config.archive.directory = config.watch.directory.clone();

    assert!(AggregatorService::from_config(config).is_err());
}
