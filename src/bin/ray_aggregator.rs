//! # Ray Aggregator
//!
//! Runs the aggregator service until Ctrl-C: watch the artifact directory,
//! aggregate per job, log and broadcast each finalized report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ray_aggregator::config::ConfigManager;
use ray_aggregator::logging::init_structured_logging;
use ray_aggregator::AggregatorService;
use tracing::info;

#[derive(Parser)]
#[command(name = "ray-aggregator")]
#[command(about = "Aggregate per-ray JSON artifacts into per-job reports")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Environment to load (development, test, production)
    #[arg(short, long)]
    environment: Option<String>,

    /// Configuration directory (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Override watch.directory
    #[arg(long)]
    watch_dir: Option<PathBuf>,

    /// Override archive.directory
    #[arg(long)]
    archive_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let environment = cli
        .environment
        .unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir, &environment)
        .context("failed to load configuration")?;

    let mut config = manager.config().clone();
    if let Some(watch_dir) = cli.watch_dir {
        config.watch.directory = watch_dir;
    }
    if let Some(archive_dir) = cli.archive_dir {
        config.archive.directory = archive_dir;
    }

    init_structured_logging(manager.environment(), &config.logging);

    let service = Arc::new(AggregatorService::from_config(config)?);
    let mut handle = Arc::clone(&service).start().await;

    #[cfg(feature = "web-api")]
    let web = start_web(&service);

    info!("👀 Watching for artifacts; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    #[cfg(feature = "web-api")]
    if let Some((sender, task)) = web {
        let _ = sender.send(true);
        task.await.context("web server task failed")??;
    }

    handle.stop().await?;
    info!(stats = ?service.status().ingest, "👋 Shutdown complete");
    Ok(())
}

#[cfg(feature = "web-api")]
fn start_web(
    service: &Arc<AggregatorService>,
) -> Option<(
    tokio::sync::watch::Sender<bool>,
    tokio::task::JoinHandle<std::io::Result<()>>,
)> {
    use ray_aggregator::submission::SubmissionWriter;
    use ray_aggregator::web::{serve, AppState};

    let web = &service.config().web;
    if !web.enabled {
        return None;
    }

    let state = AppState::new(SubmissionWriter::new(&service.config().watch.directory))
        .with_service(Arc::clone(service));
    let bind_address = web.bind_address.clone();
    let (sender, shutdown) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(async move { serve(&bind_address, state, shutdown).await });

    Some((sender, task))
}
