//! The unified response structure returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Handler name stamped on envelopes when routing found no eligible handler.
pub const NO_HANDLER: &str = "none";

/// Handler name stamped on envelopes for faults caught by the coordinator itself.
pub const COORDINATOR: &str = "coordinator";

/// Response envelope for one processed query.
///
/// Built once per request and never mutated after it is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Unique request ID
    pub request_id: String,

    pub response: String,

    /// Name of the handler that produced the response, `"none"` or `"coordinator"`
    pub agent_used: String,

    /// Handler-measured execution time in seconds
    pub execution_time: f64,

    /// Coordinator-measured wall time for the whole call in seconds
    pub coordinator_time: f64,

    pub user_id: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Generate a request identifier.
pub fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4())
}
