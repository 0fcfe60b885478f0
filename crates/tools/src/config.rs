//! Settings shared by the network-backed tools.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ToolError;

pub const WEATHER_API_KEY_ENV: &str = "WEATHER_API_KEY";
pub const NEWS_API_KEY_ENV: &str = "NEWS_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// OpenWeatherMap key; falls back to `WEATHER_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_api_key: Option<String>,

    /// NewsAPI key; falls back to `NEWS_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_api_key: Option<String>,

    #[serde(default = "default_weather_url")]
    pub weather_base_url: String,

    #[serde(default = "default_news_url")]
    pub news_base_url: String,

    #[serde(default = "default_search_url")]
    pub search_base_url: String,

    /// Per-request HTTP timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5".into()
}

fn default_news_url() -> String {
    "https://newsapi.org/v2".into()
}

fn default_search_url() -> String {
    "https://api.duckduckgo.com".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            weather_api_key: None,
            news_api_key: None,
            weather_base_url: default_weather_url(),
            news_base_url: default_news_url(),
            search_base_url: default_search_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ToolSettings {
    pub fn resolve_weather_key(&self) -> Option<String> {
        resolve(self.weather_api_key.as_deref(), WEATHER_API_KEY_ENV)
    }

    pub fn resolve_news_key(&self) -> Option<String> {
        resolve(self.news_api_key.as_deref(), NEWS_API_KEY_ENV)
    }

    /// HTTP client with the configured timeout.
    pub fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_millis(self.timeout_ms))
            .build()
            .unwrap_or_default()
    }
}

fn resolve(explicit: Option<&str>, env_var: &str) -> Option<String> {
    match explicit {
        Some(key) if !key.is_empty() => Some(key.to_string()),
        _ => std::env::var(env_var).ok().filter(|key| !key.is_empty()),
    }
}

/// Map a transport-level failure to a typed tool error.
pub(crate) fn unavailable(service: &'static str, err: impl std::fmt::Display) -> ToolError {
    ToolError::ServiceUnavailable {
        service,
        reason: err.to_string(),
    }
}
