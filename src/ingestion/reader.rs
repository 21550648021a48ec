//! # Ingestion Reader
//!
//! Reads one artifact and parses it into a [`Record`], retrying with a fixed
//! backoff while the content is unreadable or incomplete. Producers may make a
//! file visible before it is fully written, so early failures are expected.
//!
//! The retry loop holds no shared lock while it sleeps.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::logging::log_artifact_operation;
use crate::models::{parse_record, Record};

#[derive(Debug, Clone)]
pub struct IngestionReader {
    max_attempts: u32,
    backoff: Duration,
}

impl IngestionReader {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.max_attempts, config.backoff())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Read and parse `path`, retrying transient failures
    ///
    /// Returns [`IngestError::MissingKey`] as soon as a complete document without
    /// a reference identifier is seen, and [`IngestError::Exhausted`] once every
    /// attempt has failed.
    pub async fn read(&self, path: &Path) -> Result<Record, IngestError> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            debug!(path = %path.display(), attempt = attempt, "Processing file");

            match Self::read_once(path).await {
                Ok(record) => return Ok(record),
                Err(IngestError::MissingKey) => {
                    error!(path = %path.display(), "❌ Reference identifier is missing; abandoning artifact");
                    log_artifact_operation("ingest", path, "abandoned", Some("missing reference identifier"));
                    return Err(IngestError::MissingKey);
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "⚠️ Artifact not readable yet"
                    );
                    last_error = err.to_string();
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }

        error!(
            path = %path.display(),
            attempts = self.max_attempts,
            last_error = %last_error,
            "❌ Failed to process file; abandoning artifact"
        );
        log_artifact_operation("ingest", path, "abandoned", Some(&last_error));

        Err(IngestError::Exhausted {
            path: path.to_path_buf(),
            attempts: self.max_attempts,
            last_error,
        })
    }

    async fn read_once(path: &Path) -> Result<Record, IngestError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| IngestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        parse_record(&content, path)
    }
}
