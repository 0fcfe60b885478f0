//! Tool collaborators invoked by capability handlers.
//!
//! Every tool takes JSON arguments matching its input schema and returns
//! either display text or a typed [`ToolError`]. Handlers decide when to
//! call which tool; the coordinator never touches tools directly.
//!
//! | tool | backing service |
//! |---|---|
//! | `get_weather`, `get_weather_forecast` | OpenWeatherMap |
//! | `web_search` | DuckDuckGo instant answers |
//! | `get_news`, `get_top_headlines` | NewsAPI |
//! | `calculator` | local expression evaluator |
//! | `get_datetime` | local clock |

pub mod calculator;
pub mod clock;
pub mod config;
pub mod news;
pub mod search;
pub mod weather;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use switchboard_common::SwitchboardError;
use thiserror::Error;

pub use calculator::CalculatorTool;
pub use clock::DateTimeTool;
pub use config::ToolSettings;
pub use news::{NewsTool, TopHeadlinesTool};
pub use search::WebSearchTool;
pub use weather::{WeatherForecastTool, WeatherTool};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("{service} API key not configured. Please set the {env_var} environment variable.")]
    MissingApiKey {
        service: &'static str,
        env_var: &'static str,
    },

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("{service} service unavailable: {reason}")]
    ServiceUnavailable {
        service: &'static str,
        reason: String,
    },

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl From<ToolError> for SwitchboardError {
    fn from(err: ToolError) -> Self {
        SwitchboardError::Tool(err.to_string())
    }
}

/// A callable capability with a JSON-schema described input.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters(&self) -> serde_json::Value;

    async fn call(&self, args: serde_json::Value) -> Result<String, ToolError>;
}

/// Decode tool arguments into the tool's input type.
pub fn parse_args<T: DeserializeOwned>(args: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// JSON schema for a tool input type.
pub fn schema_for<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(serde_json::Value::Null)
}

/// Truncate `text` to `max` characters, appending an ellipsis when cut.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}
