//! REST API for run state and telemetry.
//!
//! Provides two GET endpoints:
//! - `/state` returns the scenario, the run summary and the latest tick
//! - `/telemetry` returns tick reports with optional range filtering

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::config::ScenarioConfig;
use crate::sim::{GridSummary, TickReport};

pub use types::{ErrorResponse, StateResponse, TelemetryQuery};

/// Read-only state shared across all request handlers.
///
/// Built once after the run completes.
pub struct AppState {
    pub config: ScenarioConfig,
    pub summary: GridSummary,
    pub reports: Vec<TickReport>,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/telemetry", get(handlers::get_telemetry))
        .with_state(state)
}

/// Binds to `addr` and serves the API until the process exits.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
