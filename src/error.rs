//! # Error Taxonomy
//!
//! Structured error types for every stage an artifact passes through. Ingestion
//! failures are terminal for the artifact they concern; archive failures are
//! housekeeping only; aggregation itself never loses counted state.

use std::path::PathBuf;

use thiserror::Error;

pub use crate::config::ConfigurationError;

/// Failures while turning an artifact on disk into a [`Record`](crate::models::Record)
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Incomplete document: missing {field}")]
    Incomplete { field: &'static str },

    #[error("Document has no reference identifier")]
    MissingKey,

    #[error("Gave up on {path} after {attempts} attempts: {last_error}")]
    Exhausted {
        path: PathBuf,
        attempts: u32,
        last_error: String,
    },
}

impl IngestError {
    /// Whether another read attempt could succeed (e.g. the writer has not flushed yet)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::Io { .. } | IngestError::Parse(_) | IngestError::Incomplete { .. }
        )
    }

    /// Whether the artifact has been given up on for good
    pub fn is_abandoned(&self) -> bool {
        matches!(self, IngestError::Exhausted { .. } | IngestError::MissingKey)
    }
}

/// Failures relocating a consumed artifact
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to create archive directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact path has no file name: {0}")]
    InvalidPath(PathBuf),
}

/// Failures routing a record into a session
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Record for key '{key}' could not be routed after {attempts} attempts")]
    RoutingExhausted { key: String, attempts: u32 },
}

/// Top-level error for the service and binaries
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("Submission error: {0}")]
    Submission(#[from] crate::submission::SubmissionError),

    #[error("Service error: {0}")]
    Service(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
