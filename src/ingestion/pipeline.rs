//! # Ingestion Pipeline
//!
//! Per-artifact processing: read (with retry) → dispatch to the session
//! registry → archive. An artifact that cannot be read is abandoned in place,
//! with no session mutation and no archiving. Once read, the artifact is
//! archived even if routing its record failed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::aggregation::{DispatchOutcome, SessionRegistry};
use crate::error::IngestError;
use crate::ingestion::archiver::Archiver;
use crate::ingestion::reader::IngestionReader;
use crate::logging::log_error;

/// What happened to one successfully read artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactOutcome {
    pub key: String,
    pub sub_id: String,
    /// `None` when the record could not be routed to a session
    pub dispatch: Option<DispatchOutcome>,
    /// `None` when archiving failed
    pub archived_to: Option<PathBuf>,
}

/// Pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub ingested: u64,
    pub abandoned: u64,
    pub routing_failures: u64,
    pub archive_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ingested: AtomicU64,
    abandoned: AtomicU64,
    routing_failures: AtomicU64,
    archive_failures: AtomicU64,
}

pub struct IngestionPipeline {
    reader: IngestionReader,
    registry: Arc<SessionRegistry>,
    archiver: Arc<dyn Archiver>,
    counters: Counters,
}

impl IngestionPipeline {
    pub fn new(
        reader: IngestionReader,
        registry: Arc<SessionRegistry>,
        archiver: Arc<dyn Archiver>,
    ) -> Self {
        Self {
            reader,
            registry,
            archiver,
            counters: Counters::default(),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub async fn process_artifact(&self, path: &Path) -> Result<ArtifactOutcome, IngestError> {
        let record = match self.reader.read(path).await {
            Ok(record) => record,
            Err(err) => {
                if err.is_abandoned() {
                    self.counters.abandoned.fetch_add(1, Ordering::AcqRel);
                }
                return Err(err);
            }
        };
        self.counters.ingested.fetch_add(1, Ordering::AcqRel);

        let key = record.key.clone();
        let sub_id = record.sub_id.clone();

        let dispatch = match self.registry.dispatch(record) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                self.counters.routing_failures.fetch_add(1, Ordering::AcqRel);
                log_error("pipeline", "dispatch", &err.to_string(), Some(&key));
                None
            }
        };

        let archived_to = match self.archiver.archive(path).await {
            Ok(target) => Some(target),
            Err(err) => {
                self.counters.archive_failures.fetch_add(1, Ordering::AcqRel);
                error!(path = %path.display(), error = %err, "❌ Error archiving file");
                None
            }
        };

        info!(
            key = %key,
            sub_id = %sub_id,
            path = %path.display(),
            archived = archived_to.is_some(),
            "✅ Artifact processed"
        );

        Ok(ArtifactOutcome {
            key,
            sub_id,
            dispatch,
            archived_to,
        })
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            ingested: self.counters.ingested.load(Ordering::Acquire),
            abandoned: self.counters.abandoned.load(Ordering::Acquire),
            routing_failures: self.counters.routing_failures.load(Ordering::Acquire),
            archive_failures: self.counters.archive_failures.load(Ordering::Acquire),
        }
    }
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("reader", &self.reader)
            .field("registry", &self.registry)
            .field("stats", &self.stats())
            .finish()
    }
}
