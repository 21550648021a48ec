use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use super::SubmissionError;

/// Writes submitted documents into the watched directory
///
/// Files are named `<referenceIdentifier>_<epoch millis>.json` and written under
/// a temporary name first, so the watcher never sees a half-written artifact.
#[derive(Debug, Clone)]
pub struct SubmissionWriter {
    directory: PathBuf,
}

impl SubmissionWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub async fn submit(&self, document: &JsonValue) -> Result<PathBuf, SubmissionError> {
        let reference = document
            .pointer("/jobInfo/referenceIdentifier")
            .and_then(JsonValue::as_str)
            .filter(|reference| !reference.is_empty())
            .ok_or(SubmissionError::MissingReference)?;

        if reference.contains(['/', '\\']) || reference.starts_with('.') {
            return Err(SubmissionError::InvalidReference(reference.to_string()));
        }

        let file_name = format!("{reference}_{}.json", Utc::now().timestamp_millis());
        self.write_atomically(&file_name, document).await
    }

    /// Write `document` as `file_name` inside the watched directory
    pub async fn write_atomically(
        &self,
        file_name: &str,
        document: &JsonValue,
    ) -> Result<PathBuf, SubmissionError> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let target = self.directory.join(file_name);
        let staging = self.directory.join(format!(".{file_name}.tmp"));

        let body = serde_json::to_vec_pretty(document)?;
        tokio::fs::write(&staging, body).await?;
        tokio::fs::rename(&staging, &target).await?;

        info!(path = %target.display(), "📝 Artifact written");
        Ok(target)
    }
}
