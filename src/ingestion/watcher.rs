//! # Directory Watcher
//!
//! Polls one directory (non-recursively) and reports files with the configured
//! extension that were not present on the previous scan. Files already present
//! at startup are treated as old unless `process_existing` is set.
//!
//! A name that disappears (archived) and later reappears is reported again. A
//! file that stays put, e.g. an abandoned artifact, is reported only once.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::WatchConfig;

#[derive(Debug, Clone)]
pub struct DirectoryWatcher {
    directory: PathBuf,
    extension: String,
    poll_interval: Duration,
    process_existing: bool,
}

impl DirectoryWatcher {
    pub fn new(directory: impl Into<PathBuf>, extension: &str, poll_interval: Duration) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.trim_start_matches('.').to_string(),
            poll_interval,
            process_existing: false,
        }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(&config.directory, &config.extension, config.poll_interval())
            .with_process_existing(config.process_existing)
    }

    pub fn with_process_existing(mut self, process_existing: bool) -> Self {
        self.process_existing = process_existing;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn is_candidate(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    /// List matching regular files currently in the directory
    pub async fn scan(&self) -> std::io::Result<BTreeSet<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        let mut found = BTreeSet::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !self.is_candidate(&path) {
                continue;
            }
            // Entries can vanish between listing and stat
            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {
                    found.insert(path);
                }
                Ok(_) => {}
                Err(err) => debug!(path = %path.display(), error = %err, "Skipping unreadable entry"),
            }
        }

        Ok(found)
    }

    /// Create the directory and take the startup snapshot. Files in the
    /// returned set are never reported; it is empty when `process_existing`
    /// is set.
    pub async fn baseline(&self) -> BTreeSet<PathBuf> {
        if let Err(err) = tokio::fs::create_dir_all(&self.directory).await {
            warn!(directory = %self.directory.display(), error = %err, "Could not create watched directory");
        }

        if self.process_existing {
            BTreeSet::new()
        } else {
            self.scan().await.unwrap_or_default()
        }
    }

    /// Emit creation events into `events` until `shutdown` flips to true or the
    /// receiving side goes away
    pub async fn run(self, events: mpsc::Sender<PathBuf>, shutdown: watch::Receiver<bool>) {
        let seen = self.baseline().await;
        self.run_from(seen, events, shutdown).await;
    }

    /// Like [`run`](Self::run), with a snapshot already taken by
    /// [`baseline`](Self::baseline)
    pub async fn run_from(
        self,
        mut seen: BTreeSet<PathBuf>,
        events: mpsc::Sender<PathBuf>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            directory = %self.directory.display(),
            extension = %self.extension,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            preexisting = seen.len(),
            "👀 Started watching folder"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let current = match self.scan().await {
                Ok(current) => current,
                Err(err) => {
                    warn!(directory = %self.directory.display(), error = %err, "Directory scan failed");
                    continue;
                }
            };

            for path in current.difference(&seen) {
                debug!(path = %path.display(), "New artifact detected");
                if events.send(path.clone()).await.is_err() {
                    info!("Artifact consumer closed; stopping watcher");
                    return;
                }
            }
            seen = current;
        }

        info!(directory = %self.directory.display(), "Stopped watching folder");
    }
}
