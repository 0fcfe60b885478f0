//! HTTP route handlers for the API.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use switchboard_common::{new_request_id, ResponseEnvelope, SwitchboardError, COORDINATOR};
use switchboard_coordinator::{CoordinatorStatus, HistoryEntry, DEFAULT_USER};
use tracing::{error, info, warn};

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub coordinator_initialized: bool,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        coordinator_initialized: state.coordinator.is_initialized(),
    })
}

/// Text query request body.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub code: &'static str,
}

impl ErrorResponse {
    fn new(status: StatusCode, code: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            code,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<SwitchboardError> for ErrorResponse {
    fn from(e: SwitchboardError) -> Self {
        match e {
            SwitchboardError::NotInitialized => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "NOT_INITIALIZED", e.to_string())
            }
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                other.to_string(),
            ),
        }
    }
}

/// Route a text query through the coordinator.
///
/// Faults below the coordinator come back as a 200 envelope carrying
/// `error`. A request that outlives the timeout gets a 504 envelope and
/// its handler task is aborted.
pub async fn query_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, ErrorResponse> {
    if request.query.trim().is_empty() {
        return Err(ErrorResponse::new(
            StatusCode::BAD_REQUEST,
            "EMPTY_QUERY",
            "query must not be empty",
        ));
    }

    info!(
        query_preview = %request.query.chars().take(50).collect::<String>(),
        user_id = ?request.user_id,
        "Received query"
    );

    let pending = state.coordinator.process_query(
        &request.query,
        request.user_id.as_deref(),
        request.context,
    );
    let outcome = tokio::time::timeout(state.request_timeout, pending).await;

    match outcome {
        Ok(Ok(envelope)) => Ok(Json(envelope).into_response()),
        Ok(Err(e)) => {
            error!(error = %e, "Query rejected");
            Err(e.into())
        }
        Err(_) => {
            let timeout_ms = state.request_timeout.as_millis() as u64;
            warn!(timeout_ms, "Query timed out");
            let cause = format!("Request timed out after {timeout_ms}ms");
            let envelope = ResponseEnvelope {
                request_id: new_request_id(),
                response: format!("I encountered an error while processing your request: {cause}"),
                agent_used: COORDINATOR.into(),
                execution_time: state.request_timeout.as_secs_f64(),
                coordinator_time: state.request_timeout.as_secs_f64(),
                user_id: request.user_id.unwrap_or_else(|| DEFAULT_USER.into()),
                timestamp: Utc::now(),
                metadata: None,
                error: Some(cause),
            };
            Ok((StatusCode::GATEWAY_TIMEOUT, Json(envelope)).into_response())
        }
    }
}

/// Handler and coordinator status snapshot.
pub async fn agents_status(State(state): State<Arc<AppState>>) -> Json<CoordinatorStatus> {
    Json(state.coordinator.get_agent_status())
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<HistoryEntry>> {
    Json(state.coordinator.get_query_history(params.user_id.as_deref()))
}
