//! Application state for the API server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use switchboard_coordinator::Coordinator;

/// Shared application state for the API server.
pub struct AppState {
    /// The coordinator that handles all routing
    pub coordinator: Arc<Coordinator>,

    /// Server start time (for health checks)
    pub start_time: Instant,

    /// Upper bound on one `/query/text` request
    pub request_timeout: Duration,
}

impl AppState {
    /// Wrap a coordinator, taking the request timeout from its server config.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        let request_timeout =
            Duration::from_millis(coordinator.config().server.request_timeout_ms);
        Self {
            coordinator,
            start_time: Instant::now(),
            request_timeout,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
