use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One parsed ray event, grouped with its siblings by `key`
///
/// `expected_count` is repeated on every record of a job; the session keeps
/// whichever value it saw first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Job reference identifier
    pub key: String,
    /// Ray identifier, unique within the job
    pub sub_id: String,
    pub status: String,
    pub expected_count: u32,
    pub source_path: Option<PathBuf>,
    pub received_at: DateTime<Utc>,
}

impl Record {
    pub fn new(
        key: impl Into<String>,
        sub_id: impl Into<String>,
        status: impl Into<String>,
        expected_count: u32,
    ) -> Self {
        Self {
            key: key.into(),
            sub_id: sub_id.into(),
            status: status.into(),
            expected_count,
            source_path: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, path: &Path) -> Self {
        self.source_path = Some(path.to_path_buf());
        self
    }
}
