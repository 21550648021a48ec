//! # Structured Logging Module
//!
//! Environment-aware structured logging for the ingestion pipeline and the
//! session lifecycle. Console output is human-readable by default and switches
//! to JSON lines for production deployments.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging(environment: &str, logging: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = build_filter(environment, logging.level.as_deref());

        let layer = match logging.format {
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .boxed(),
        };

        // A host process may already own the global subscriber
        if tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            format = ?logging.format,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// RUST_LOG wins, then the configured level, then the environment default
fn build_filter(environment: &str, configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = configured
            .map(str::to_string)
            .unwrap_or_else(|| get_log_level(environment));
        EnvFilter::new(level)
    })
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for session lifecycle operations
pub fn log_session_operation(
    operation: &str,
    key: &str,
    session_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        key = %key,
        session_id = session_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🧺 SESSION_OPERATION"
    );
}

/// Log structured data for artifact handling (read, archive, abandon)
pub fn log_artifact_operation(
    operation: &str,
    path: &std::path::Path,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        path = %path.display(),
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📄 ARTIFACT_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
