//! HTTP transport for Switchboard.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /query/text` - Route a text query and return its response envelope
//! - `GET /agents/status` - Coordinator and handler status
//! - `GET /history?user_id=` - Recent query history
//!
//! # Architecture
//!
//! ```text
//! Client
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   HTTP server   │ ◄── This crate
//! │     (Axum)      │
//! └────────┬────────┘
//!          │ process_query
//!          ▼
//! ┌─────────────────┐
//! │   Coordinator   │
//! └─────────────────┘
//! ```

pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/query/text", post(routes::query_text))
        .route("/agents/status", get(routes::agents_status))
        .route("/history", get(routes::history))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state);

    info!(%addr, "Starting Switchboard API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
