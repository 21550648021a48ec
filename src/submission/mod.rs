//! # Submission
//!
//! Producer side of the watched directory: the artifact writer used by the
//! HTTP submission endpoint and the synthetic batch generator.

pub mod generator;
pub mod writer;

use thiserror::Error;

pub use generator::{build_document, write_batch, BatchSpec, MAX_BATCH_FILES};
pub use writer::SubmissionWriter;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Document has no jobInfo.referenceIdentifier")]
    MissingReference,

    #[error("Reference identifier '{0}' cannot be used as a file name")]
    InvalidReference(String),

    #[error("Batch of {jobs} jobs × {rays_per_job} rays exceeds the {max} file limit")]
    BatchTooLarge { jobs: u32, rays_per_job: u32, max: u32 },

    #[error("Failed to write artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize artifact: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SubmissionError {
    /// Whether the caller sent an unusable document, as opposed to a local write failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SubmissionError::MissingReference
                | SubmissionError::InvalidReference(_)
                | SubmissionError::BatchTooLarge { .. }
        )
    }
}
