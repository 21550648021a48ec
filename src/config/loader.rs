//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles config directory discovery,
//! environment detection, and layering of base file, environment overlay and
//! environment-variable overrides.

use super::error::{ConfigResult, ConfigurationError};
use super::AggregatorConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE: &str = "aggregator.toml";
const ENVIRONMENTS_DIR: &str = "environments";
const ENV_PREFIX: &str = "AGGREGATOR";

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: AggregatorConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_layers(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            watch_dir = %config.watch.directory.display(),
            archive_dir = %config.archive.directory.display(),
            idle_timeout_secs = config.session.idle_timeout_secs,
            max_attempts = config.ingest.max_attempts,
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (tests, embedding)
    pub fn from_config(config: AggregatorConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    fn load_layers(config_directory: &Path, environment: &str) -> ConfigResult<AggregatorConfig> {
        let base = config_directory.join(BASE_FILE);
        let overlay = config_directory
            .join(ENVIRONMENTS_DIR)
            .join(format!("{environment}.toml"));

        debug!(
            base = %base.display(),
            base_present = base.exists(),
            overlay = %overlay.display(),
            overlay_present = overlay.exists(),
            "Resolving configuration layers"
        );

        ::config::Config::builder()
            .add_source(::config::File::from(base).required(false))
            .add_source(::config::File::from(overlay).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|layered| layered.try_deserialize::<AggregatorConfig>())
            .map_err(|e| ConfigurationError::load_error(environment, e))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: AGGREGATOR_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("AGGREGATOR_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var("AGGREGATOR_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
