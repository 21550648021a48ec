#![allow(clippy::doc_markdown)] // Allow technical terms like JSON, DashMap in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Ray Aggregator
//!
//! Watches a directory for per-ray JSON artifacts, groups them by job reference
//! identifier and emits one report per job once every declared transaction has
//! arrived, or once the job has gone quiet for too long.
//!
//! ## Architecture
//!
//! ```text
//! DirectoryWatcher ─▶ IngestionPipeline ─▶ SessionRegistry ─▶ Session ─▶ ReportSink
//!                          │                                               ├─ tracing
//!                          └─▶ DirectoryArchiver                            └─ ReportPublisher
//! ```
//!
//! ## Key Features
//!
//! - **Exactly-once finalization**: count completion, idle deadline and shutdown
//!   flush race safely; each session reports once
//! - **Tolerant ingestion**: half-written artifacts are retried with backoff and
//!   abandoned in place after the last attempt
//! - **No lost records**: a record that lands on a session finalizing underneath it
//!   is re-routed to a fresh session for the same key
//! - **Layered configuration**: TOML base, per-environment overlay, environment
//!   variable overrides
//!
//! ## Module Organization
//!
//! - [`models`] - Artifact wire model and the normalized [`Record`]
//! - [`ingestion`] - Watcher, retrying reader, archiver and per-artifact pipeline
//! - [`aggregation`] - Sessions, registry and reports
//! - [`scheduler`] - Cancellable one-shot deadlines
//! - [`events`] - Broadcast of finalized reports
//! - [`service`] - Wiring and lifecycle
//! - [`submission`] - Artifact writer and synthetic batch generator
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ray_aggregator::{AggregatorConfig, AggregatorService};
//!
//! # async fn example() -> ray_aggregator::Result<()> {
//! let service = Arc::new(AggregatorService::from_config(AggregatorConfig::default())?);
//! let mut reports = service.publisher().subscribe();
//! let mut handle = service.start().await;
//!
//! if let Ok(published) = reports.recv().await {
//!     println!("{}", ray_aggregator::format_report(&published.report));
//! }
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod config;
pub mod error;
pub mod events;
pub mod ingestion;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod submission;
#[cfg(feature = "web-api")]
pub mod web;

pub use aggregation::{
    format_report, AddOutcome, CompletionReason, ReportSink, SessionRegistry, SessionReport,
};
pub use config::{AggregatorConfig, ConfigManager};
pub use error::{AggregatorError, Result};
pub use events::{PublishedReport, ReportPublisher};
pub use models::{EventDocument, Record};
pub use service::{AggregatorService, ServiceHandle, ServiceStatus};
