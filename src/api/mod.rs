//! REST API over a finished comparison.
//!
//! Provides two GET endpoints:
//! - `/reports`: scenario summary, baseline, and one report per algorithm
//! - `/telemetry/{algorithm}`: tick records with optional range filtering

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::runner::ComparisonReport;

/// Read-only state shared by all handlers.
///
/// Built once after the comparison finishes, so no locking is needed.
pub struct AppState {
    pub report: ComparisonReport,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/reports", get(handlers::get_reports))
        .route("/telemetry/{algorithm}", get(handlers::get_telemetry))
        .with_state(state)
}

/// Binds to `addr` and serves until the process is stopped.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
