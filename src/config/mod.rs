//! # Aggregator Configuration
//!
//! Layered configuration for the watcher, ingestion retry policy, session
//! deadlines, event channel, logging and the optional submission endpoint.
//!
//! ## Sources (lowest to highest precedence)
//!
//! 1. Built-in defaults (every field has one)
//! 2. `config/aggregator.toml`
//! 3. `config/environments/<environment>.toml`
//! 4. `AGGREGATOR__<SECTION>__<FIELD>` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ray_aggregator::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let idle = manager.config().session.idle_timeout();
//! println!("sessions finalize after {idle:?} of silence");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/aggregator.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Directory watching for newly created artifacts
    pub watch: WatchConfig,

    /// Destination for consumed artifacts
    pub archive: ArchiveConfig,

    /// Read/parse retry policy
    pub ingest: IngestConfig,

    /// Per-key session behaviour
    pub session: SessionConfig,

    /// Finalized report broadcasting
    pub events: EventsConfig,

    /// Log level and output format
    pub logging: LoggingConfig,

    /// Submission endpoint
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    pub directory: PathBuf,
    /// File extension (without the dot) of artifacts worth ingesting
    pub extension: String,
    pub poll_interval_ms: u64,
    /// Treat files already present at startup as newly created
    pub process_existing: bool,
    pub max_concurrent_ingestions: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("JSON"),
            extension: "json".to_string(),
            poll_interval_ms: 500,
            process_existing: false,
            max_concurrent_ingestions: 10,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub directory: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("ARCHIVED_JSON"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 2000,
        }
    }
}

impl IngestConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Silence after the latest record before a session finalizes with what it has
    pub idle_timeout_secs: u64,
    /// Finalize every active session when the service stops
    pub flush_on_shutdown: bool,
    /// How often a record may be re-routed when its session finalized underneath it
    pub max_reroutes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 60,
            flush_on_shutdown: true,
            max_reroutes: 3,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit filter directive; falls back to an environment-derived level when unset
    pub level: Option<String>,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub bind_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

impl AggregatorConfig {
    /// Reject settings that would stall or spin the pipeline
    pub fn validate(&self) -> ConfigResult<()> {
        if self.ingest.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "ingest.max_attempts",
                "0",
                "at least one read attempt is required",
            ));
        }

        if self.watch.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "watch.poll_interval_ms",
                "0",
                "poll interval must be positive",
            ));
        }

        if self.watch.max_concurrent_ingestions == 0 {
            return Err(ConfigurationError::invalid_value(
                "watch.max_concurrent_ingestions",
                "0",
                "at least one ingestion worker is required",
            ));
        }

        if self.session.idle_timeout_secs == 0 {
            return Err(ConfigurationError::invalid_value(
                "session.idle_timeout_secs",
                "0",
                "idle timeout must be positive",
            ));
        }

        if self.watch.extension.trim_start_matches('.').is_empty() {
            return Err(ConfigurationError::invalid_value(
                "watch.extension",
                self.watch.extension.clone(),
                "extension must not be empty",
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "broadcast channel needs capacity",
            ));
        }

        if self.watch.directory == self.archive.directory {
            return Err(ConfigurationError::validation_error(format!(
                "watch and archive directories must differ (both are {})",
                self.watch.directory.display()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_observed_deployment() {
        let config = AggregatorConfig::default();

        assert_eq!(config.ingest.max_attempts, 3);
        assert_eq!(config.ingest.backoff(), Duration::from_secs(2));
        assert_eq!(config.session.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.watch.directory, PathBuf::from("JSON"));
        assert_eq!(config.archive.directory, PathBuf::from("ARCHIVED_JSON"));
        assert_eq!(config.watch.extension, "json");
        assert!(!config.watch.process_existing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let mut config = AggregatorConfig::default();
        config.ingest.max_attempts = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ingest.max_attempts"));
    }

    #[test]
    fn test_validation_rejects_shared_directories() {
        let mut config = AggregatorConfig::default();
        config.archive.directory = config.watch.directory.clone();

        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: AggregatorConfig =
            serde_json::from_value(serde_json::json!({ "session": { "idle_timeout_secs": 5 } }))
                .unwrap();

        assert_eq!(config.session.idle_timeout_secs, 5);
        assert_eq!(config.session.max_reroutes, 3);
        assert_eq!(config.ingest.max_attempts, 3);
    }
}
