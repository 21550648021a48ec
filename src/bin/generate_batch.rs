//! # Batch Generator
//!
//! Writes a synthetic batch of per-ray artifacts into the watched directory,
//! pacing them so sessions can be observed filling up.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ray_aggregator::config::{ConfigManager, LoggingConfig};
use ray_aggregator::logging::init_structured_logging;
use ray_aggregator::submission::{write_batch, BatchSpec, SubmissionWriter};
use tracing::info;

#[derive(Parser)]
#[command(name = "generate-batch")]
#[command(about = "Write synthetic ray artifacts into the watched directory")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Number of jobs
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(1..=999))]
    jobs: u32,

    /// Rays per job; also each job's transactionCount
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=999))]
    rays: u32,

    /// Pause between files in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pause_ms: u64,

    /// Target directory (default: watch.directory from configuration)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging(&ConfigManager::detect_environment(), &LoggingConfig::default());

    let directory = match cli.output {
        Some(directory) => directory,
        None => ConfigManager::load()
            .context("failed to load configuration")?
            .config()
            .watch
            .directory
            .clone(),
    };

    let spec = BatchSpec::default()
        .with_jobs(cli.jobs)
        .with_rays_per_job(cli.rays)
        .with_pause(Duration::from_millis(cli.pause_ms));

    let written = write_batch(&SubmissionWriter::new(&directory), &spec).await?;
    info!(files = written.len(), directory = %directory.display(), "Done");
    Ok(())
}
