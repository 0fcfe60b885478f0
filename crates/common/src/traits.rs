//! The capability handler contract.
//!
//! Defined in `switchboard-common` so that both the coordinator and the
//! handler crate can reference it without circular dependencies.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A confidence estimate in `[0.0, 1.0]` of a handler's fitness for a query.
pub type Confidence = f32;

/// Clamp a raw evidence sum into the confidence range.
///
/// Non-finite input (NaN, infinities) carries no usable evidence and maps to 0.0.
pub fn clamp_confidence(raw: f32) -> Confidence {
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// The result of one `Handler::execute` call.
///
/// Handlers never propagate execution faults; a failed run carries a
/// user-facing `response` describing the problem and the cause in `error`.
#[derive(Debug, Clone)]
pub struct Execution {
    pub response: String,
    /// Wall-clock span from entry to return, including failure paths.
    pub elapsed: Duration,
    /// Tool identifiers invoked while producing the response, in call order.
    pub tools_used: Vec<String>,
    /// Model that produced the response, when one was reached.
    pub model: Option<String>,
    pub error: Option<String>,
}

impl Execution {
    pub fn success(response: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            response: response.into(),
            elapsed,
            tools_used: Vec::new(),
            model: None,
            error: None,
        }
    }

    /// Build a failed execution with the standard user-facing wording.
    pub fn failure(cause: impl Into<String>, elapsed: Duration) -> Self {
        let cause = cause.into();
        Self {
            response: format!("I encountered an error while processing your request: {cause}"),
            elapsed,
            tools_used: Vec::new(),
            model: None,
            error: Some(cause),
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools_used = tools;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Read-only status snapshot of one handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerStatus {
    pub name: String,
    pub description: String,
    pub tools: Vec<String>,
    pub model: String,
    pub initialized: bool,
    pub conversation_length: usize,
}

/// The core trait every capability handler implements.
///
/// `score` is synchronous and must never block; only `execute` suspends.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Unique registry name, e.g. `"WeatherAgent"`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Tool identifiers this handler may invoke, in declaration order.
    fn tools(&self) -> Vec<String>;

    /// Estimate how well this handler fits `query`.
    ///
    /// Implementations are pure functions of the query text. An `Err` is
    /// treated by the caller as a confidence of 0.0.
    fn score(&self, query: &str) -> Result<Confidence>;

    /// Acquire whatever the handler needs before it can execute.
    ///
    /// Must be idempotent: a second call on an initialized handler is a no-op.
    async fn initialize(&self) -> Result<()>;

    /// Produce a response for `query`. Never fails; see [`Execution`].
    async fn execute(&self, query: &str, context: Option<&serde_json::Value>) -> Execution;

    fn status(&self) -> HandlerStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_confidence_bounds() {
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(0.45), 0.45);
        assert_eq!(clamp_confidence(f32::NAN), 0.0);
        assert_eq!(clamp_confidence(f32::INFINITY), 0.0);
    }

    #[test]
    fn failure_execution_wording() {
        let exec = Execution::failure("quota exceeded", Duration::from_millis(12));
        assert!(!exec.is_success());
        assert_eq!(exec.error.as_deref(), Some("quota exceeded"));
        assert_eq!(
            exec.response,
            "I encountered an error while processing your request: quota exceeded"
        );
        assert_eq!(exec.elapsed, Duration::from_millis(12));
    }

    #[test]
    fn success_execution_builders() {
        let exec = Execution::success("sunny", Duration::ZERO)
            .with_tools(vec!["get_weather".into()])
            .with_model("gpt-3.5-turbo");
        assert!(exec.is_success());
        assert_eq!(exec.tools_used, vec!["get_weather".to_string()]);
        assert_eq!(exec.model.as_deref(), Some("gpt-3.5-turbo"));
    }
}
