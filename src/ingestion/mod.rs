//! # Ingestion
//!
//! Everything between a file appearing in the watched directory and its record
//! reaching the session registry.
//!
//! ```text
//! DirectoryWatcher ──path──▶ IngestionPipeline
//!                               ├─ IngestionReader (retry/backoff)
//!                               ├─ SessionRegistry::dispatch
//!                               └─ Archiver
//! ```

pub mod archiver;
pub mod pipeline;
pub mod reader;
pub mod watcher;

pub use archiver::{Archiver, DirectoryArchiver};
pub use pipeline::{ArtifactOutcome, IngestStats, IngestionPipeline};
pub use reader::IngestionReader;
pub use watcher::DirectoryWatcher;
