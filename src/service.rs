//! # Aggregator Service
//!
//! Wires configuration into a running system: deadline scheduler, session
//! registry, report sinks, ingestion pipeline and directory watcher.
//!
//! ## Lifecycle
//!
//! - [`AggregatorService::start`] snapshots the watched directory, spawns the
//!   watch loop and returns a [`ServiceHandle`]
//! - each detected artifact gets its own task, bounded by
//!   `watch.max_concurrent_ingestions`
//! - [`ServiceHandle::stop`] stops the watcher, drains in-flight artifacts and,
//!   when `session.flush_on_shutdown` is set, finalizes open sessions

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::aggregation::{
    FanoutSink, RegistryStats, ReportSink, SessionRegistry, SessionSnapshot, TracingReportSink,
};
use crate::config::AggregatorConfig;
use crate::error::{AggregatorError, Result};
use crate::events::ReportPublisher;
use crate::ingestion::{
    DirectoryArchiver, DirectoryWatcher, IngestStats, IngestionPipeline, IngestionReader,
};
use crate::scheduler::DeadlineScheduler;

const ARTIFACT_CHANNEL_CAPACITY: usize = 256;

/// Fully wired aggregator
#[derive(Debug)]
pub struct AggregatorService {
    config: AggregatorConfig,
    scheduler: DeadlineScheduler,
    registry: Arc<SessionRegistry>,
    pipeline: Arc<IngestionPipeline>,
    publisher: ReportPublisher,
}

/// Point-in-time service status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub watch_directory: PathBuf,
    pub archive_directory: PathBuf,
    pub registry: RegistryStats,
    pub ingest: IngestStats,
    pub armed_deadlines: usize,
    pub sessions: Vec<SessionSnapshot>,
}

impl AggregatorService {
    /// Build the service on the current Tokio runtime
    pub fn from_config(config: AggregatorConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Handle::try_current()
            .map_err(|err| AggregatorError::Service(format!("no Tokio runtime available: {err}")))?;
        let scheduler = DeadlineScheduler::new(runtime);
        let publisher = ReportPublisher::new(config.events.channel_capacity);
        let sink: Arc<dyn ReportSink> = Arc::new(
            FanoutSink::new()
                .with(Arc::new(TracingReportSink))
                .with(Arc::new(publisher.clone())),
        );

        let registry = Arc::new(SessionRegistry::from_config(
            &config.session,
            scheduler.clone(),
            sink,
        ));
        let pipeline = Arc::new(IngestionPipeline::new(
            IngestionReader::from_config(&config.ingest),
            Arc::clone(&registry),
            Arc::new(DirectoryArchiver::new(&config.archive.directory)),
        ));

        info!(
            watch_dir = %config.watch.directory.display(),
            archive_dir = %config.archive.directory.display(),
            idle_timeout_secs = config.session.idle_timeout_secs,
            "🚀 Aggregator service initialized"
        );

        Ok(Self {
            config,
            scheduler,
            registry,
            pipeline,
            publisher,
        })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn pipeline(&self) -> &Arc<IngestionPipeline> {
        &self.pipeline
    }

    /// Subscribe here to receive every finalized session report
    pub fn publisher(&self) -> &ReportPublisher {
        &self.publisher
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            watch_directory: self.config.watch.directory.clone(),
            archive_directory: self.config.archive.directory.clone(),
            registry: self.registry.stats(),
            ingest: self.pipeline.stats(),
            armed_deadlines: self.scheduler.armed_count(),
            sessions: self.registry.snapshot(),
        }
    }

    /// Take the watcher's startup snapshot, then spawn the watch loop in the
    /// background. Any file created after this returns is treated as new.
    pub async fn start(self: Arc<Self>) -> ServiceHandle {
        let (shutdown_sender, shutdown) = watch::channel(false);
        let watcher = DirectoryWatcher::from_config(&self.config.watch);
        let seen = watcher.baseline().await;

        let service = Arc::clone(&self);
        let join = tokio::spawn(async move { service.run_watching(watcher, seen, shutdown).await });

        ServiceHandle {
            service: self,
            shutdown_sender: Some(shutdown_sender),
            join: Some(join),
        }
    }

    /// Watch and ingest until `shutdown` flips to true
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let watcher = DirectoryWatcher::from_config(&self.config.watch);
        let seen = watcher.baseline().await;
        self.run_watching(watcher, seen, shutdown).await
    }

    async fn run_watching(
        &self,
        watcher: DirectoryWatcher,
        seen: BTreeSet<PathBuf>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let (events, mut artifacts) = mpsc::channel::<PathBuf>(ARTIFACT_CHANNEL_CAPACITY);
        let watcher_task = tokio::spawn(watcher.run_from(seen, events, shutdown));

        let permits = Arc::new(Semaphore::new(self.config.watch.max_concurrent_ingestions));
        let mut in_flight = JoinSet::new();

        // Ends once the watcher stops and drops its sender
        while let Some(path) = artifacts.recv().await {
            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let pipeline = Arc::clone(&self.pipeline);

            in_flight.spawn(async move {
                let _permit = permit;
                if let Err(err) = pipeline.process_artifact(&path).await {
                    debug!(path = %path.display(), error = %err, "Artifact not ingested");
                }
            });

            while let Some(finished) = in_flight.try_join_next() {
                if let Err(err) = finished {
                    error!(error = %err, "Ingestion task panicked");
                }
            }
        }

        info!(in_flight = in_flight.len(), "Draining in-flight artifacts");
        while let Some(finished) = in_flight.join_next().await {
            if let Err(err) = finished {
                error!(error = %err, "Ingestion task panicked");
            }
        }

        if let Err(err) = watcher_task.await {
            warn!(error = %err, "Watcher task ended abnormally");
        }

        if self.config.session.flush_on_shutdown {
            self.registry.shutdown_flush();
        }

        info!(stats = ?self.pipeline.stats(), "🛑 Aggregator service stopped");
        Ok(())
    }
}

/// Handle to a running service
#[derive(Debug)]
pub struct ServiceHandle {
    service: Arc<AggregatorService>,
    shutdown_sender: Option<watch::Sender<bool>>,
    join: Option<JoinHandle<Result<()>>>,
}

impl ServiceHandle {
    pub fn service(&self) -> &Arc<AggregatorService> {
        &self.service
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_sender.is_some()
    }

    /// Signal shutdown and wait for the watch loop to drain
    pub async fn stop(&mut self) -> Result<()> {
        let Some(sender) = self.shutdown_sender.take() else {
            warn!("Aggregator service already stopped");
            return Ok(());
        };

        // The receiver may already be gone if the loop exited on its own
        let _ = sender.send(true);
        info!("🛑 Aggregator service shutdown requested");

        match self.join.take() {
            Some(join) => join
                .await
                .map_err(|err| AggregatorError::Service(format!("service task failed: {err}")))?,
            None => Ok(()),
        }
    }
}
