//! # Archiver
//!
//! Relocates a fully consumed artifact out of the watched directory. Archiving
//! concerns the artifact, not its job: it runs whether or not the job's session
//! has finalized, and a failure here never rolls back aggregation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::ArchiveError;

/// Moves consumed artifacts to durable storage
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Relocate `path`, returning its new location
    async fn archive(&self, path: &Path) -> Result<PathBuf, ArchiveError>;
}

/// Moves artifacts into a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct DirectoryArchiver {
    destination: PathBuf,
}

impl DirectoryArchiver {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Cross-device renames fail; fall back to copy then delete
    async fn copy_then_remove(from: &Path, to: &Path) -> std::io::Result<()> {
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await
    }
}

#[async_trait]
impl Archiver for DirectoryArchiver {
    async fn archive(&self, path: &Path) -> Result<PathBuf, ArchiveError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| ArchiveError::InvalidPath(path.to_path_buf()))?;

        tokio::fs::create_dir_all(&self.destination)
            .await
            .map_err(|source| ArchiveError::CreateDirectory {
                path: self.destination.clone(),
                source,
            })?;

        let target = self.destination.join(file_name);

        if let Err(rename_err) = tokio::fs::rename(path, &target).await {
            if rename_err.kind() == ErrorKind::NotFound {
                return Err(ArchiveError::Move {
                    from: path.to_path_buf(),
                    to: target,
                    source: rename_err,
                });
            }

            warn!(
                from = %path.display(),
                to = %target.display(),
                error = %rename_err,
                "Rename failed; falling back to copy"
            );
            Self::copy_then_remove(path, &target)
                .await
                .map_err(|source| ArchiveError::Move {
                    from: path.to_path_buf(),
                    to: target.clone(),
                    source,
                })?;
        }

        info!(from = %path.display(), to = %target.display(), "🗄️ Archived file");
        Ok(target)
    }
}
