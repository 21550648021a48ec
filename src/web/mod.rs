//! # Submission Web API
//!
//! HTTP front door for producers that cannot write into the watched directory
//! themselves.
//!
//! ## Routes
//!
//! - `POST /api/generate`: write the posted document as a new artifact
//! - `GET /api/status`: registry, pipeline and open-session view
//! - `GET /health`: liveness

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub mod handlers;
pub mod response_types;
pub mod state;

pub use response_types::{ApiError, ApiResult, GenerateResponse};
pub use state::AppState;

pub fn submission_routes() -> Router<AppState> {
    Router::new()
        .route("/api/generate", post(handlers::submission::generate))
        .route("/api/status", get(handlers::health::service_status))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::basic_health))
}

/// Create the web application with all routes
pub fn create_app(state: AppState) -> Router {
    let app = Router::new()
        .merge(health_routes())
        .merge(submission_routes())
        .with_state(state);

    info!("Submission web application created");
    app
}

/// Serve `state` on `bind_address` until `shutdown` flips to true
pub async fn serve(
    bind_address: &str,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    info!(bind_address = %listener.local_addr()?, "🌐 Submission API listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}
