//! Shared fixtures: artifact documents, collecting sinks and wired registries.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ray_aggregator::aggregation::{ReportSink, SessionReport};
use ray_aggregator::config::AggregatorConfig;
use ray_aggregator::scheduler::DeadlineScheduler;
use ray_aggregator::SessionRegistry;
use serde_json::{json, Value as JsonValue};
use tokio::runtime::Handle;

/// Minimal well-formed artifact for one ray of a job
pub fn artifact(key: &str, ray: &str, state: &str, transaction_count: u32) -> JsonValue {
    json!({
        "notificationInfo": { "stage": "Final", "source": "iPlus" },
        "trackingInfo": {
            "rayIdentifier": ray,
            "sourceTypeIdentifier": "PayementTeam001",
            "state": state
        },
        "jobInfo": {
            "identifier": "Dev_ExtractId_001",
            "referenceIdentifier": key,
            "definition": "Payment_Extract_001",
            "transactionCount": transaction_count,
            "state": "Started"
        },
        "transactionInfo": []
    })
}

pub fn write_artifact(dir: &Path, file_name: &str, document: &JsonValue) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(file_name);
    std::fs::write(&path, document.to_string()).unwrap();
    path
}

/// Sink that keeps every delivered report
#[derive(Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<SessionReport>>,
}

impl CollectingSink {
    pub fn reports(&self) -> Vec<SessionReport> {
        self.reports.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().len()
    }
}

impl ReportSink for CollectingSink {
    fn deliver(&self, report: &SessionReport) {
        self.reports.lock().push(report.clone());
    }
}

/// Registry on the current runtime delivering into a [`CollectingSink`]
pub fn test_registry(
    idle_timeout: Duration,
    max_reroutes: u32,
) -> (Arc<SessionRegistry>, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::default());
    let registry = Arc::new(SessionRegistry::new(
        DeadlineScheduler::new(Handle::current()),
        sink.clone(),
        idle_timeout,
        max_reroutes,
    ));
    (registry, sink)
}

/// Fast-polling configuration rooted in `root`
pub fn test_config(root: &Path) -> AggregatorConfig {
    let mut config = AggregatorConfig::default();
    config.watch.directory = root.join("JSON");
    config.watch.poll_interval_ms = 20;
    config.watch.process_existing = true;
    config.archive.directory = root.join("ARCHIVED_JSON");
    config.ingest.max_attempts = 3;
    config.ingest.backoff_ms = 20;
    config.session.idle_timeout_secs = 30;
    config
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
