//! Web search through the DuckDuckGo instant answer API (no key required).

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::{unavailable, ToolSettings};
use crate::{parse_args, schema_for, truncate, Tool, ToolError};

const SERVICE: &str = "Search";
const MAX_RELATED: usize = 3;
const RELATED_CHARS: usize = 200;

/// Input for the web search tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchInput {
    /// Search query to find information on the web
    pub query: String,

    /// Number of related results to include (at most 3)
    #[serde(default = "default_num_results")]
    pub num_results: usize,
}

fn default_num_results() -> usize {
    MAX_RELATED
}

fn non_empty<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Render an instant answer payload.
pub fn format_results(data: &Value, query: &str, num_results: usize) -> String {
    let mut out = format!("Search Results for '{query}':\n");
    let mut found = false;

    if let Some(answer) = non_empty(data, "Answer") {
        out.push_str(&format!("\nQuick Answer: {answer}\n"));
        found = true;
    }

    if let Some(summary) = non_empty(data, "Abstract") {
        out.push_str(&format!("\nSummary: {summary}\n"));
        if let Some(source) = non_empty(data, "AbstractSource") {
            out.push_str(&format!("Source: {source}\n"));
        }
        found = true;
    }

    if let Some(definition) = non_empty(data, "Definition") {
        out.push_str(&format!("\nDefinition: {definition}\n"));
        if let Some(source) = non_empty(data, "DefinitionSource") {
            out.push_str(&format!("Source: {source}\n"));
        }
        found = true;
    }

    let related: Vec<&str> = data
        .get("RelatedTopics")
        .and_then(Value::as_array)
        .map(|topics| {
            topics
                .iter()
                .filter_map(|topic| non_empty(topic, "Text"))
                .take(num_results.clamp(1, MAX_RELATED))
                .collect()
        })
        .unwrap_or_default();

    if !related.is_empty() {
        out.push_str("\nRelated Information:\n");
        for (i, text) in related.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, truncate(text, RELATED_CHARS)));
        }
        found = true;
    }

    if !found {
        out.push_str(
            "\nNo detailed information found. You may want to try a more specific search query.\n",
        );
    }

    out.trim_end().to_string()
}

/// `web_search`: general information lookup.
pub struct WebSearchTool {
    base_url: String,
    http: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            base_url: settings.search_base_url.trim_end_matches('/').to_string(),
            http: settings.http_client(),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information on any topic. Use this for facts, \
         definitions and general knowledge that may be newer than your training data."
    }

    fn parameters(&self) -> Value {
        schema_for::<SearchInput>()
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let input: SearchInput = parse_args(args)?;
        if input.query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("query must not be empty".into()));
        }

        let response = self
            .http
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", input.query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| unavailable(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(unavailable(SERVICE, format!("HTTP {}", response.status())));
        }

        let data: Value = response.json().await.map_err(|e| unavailable(SERVICE, e))?;
        info!(query = %input.query, "Web search completed");
        Ok(format_results(&data, &input.query, input.num_results))
    }
}
