//! News lookups against NewsAPI.

use async_trait::async_trait;
use chrono::DateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::{unavailable, ToolSettings, NEWS_API_KEY_ENV};
use crate::{parse_args, schema_for, truncate, Tool, ToolError};

const SERVICE: &str = "News";
const PAGE_SIZE: &str = "5";
const DESCRIPTION_CHARS: usize = 150;

/// Input for the news search tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewsInput {
    /// Search query for news articles; empty means top headlines
    #[serde(default)]
    pub query: String,

    /// News category (business, entertainment, general, health, science, sports, technology)
    #[serde(default = "default_category")]
    pub category: String,

    /// Country code for headlines (us, gb, ca, ...)
    #[serde(default = "default_country")]
    pub country: String,
}

/// Input for the top headlines tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeadlinesInput {
    /// News category (business, entertainment, general, health, science, sports, technology)
    #[serde(default = "default_category")]
    pub category: String,

    /// Country code (us, gb, ca, ...)
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_category() -> String {
    "general".into()
}

fn default_country() -> String {
    "us".into()
}

fn format_published(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Render a list of NewsAPI articles under `heading`.
pub fn format_articles(articles: &[Value], heading: &str) -> String {
    let mut out = format!("{heading}\n");
    for (i, article) in articles.iter().take(5).enumerate() {
        let text = |key: &str| article.get(key).and_then(Value::as_str).unwrap_or("");

        let title = match text("title") {
            "" => "No title",
            t => t,
        };
        let source = article
            .pointer("/source/name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown source");
        let published = match text("publishedAt") {
            "" => "Unknown date".to_string(),
            raw => format_published(raw),
        };

        out.push_str(&format!("\n{}. {title}\n   Source: {source} | {published}\n", i + 1));
        let description = text("description");
        if !description.is_empty() {
            out.push_str(&format!("   {}\n", truncate(description, DESCRIPTION_CHARS)));
        }
        let url = text("url");
        if !url.is_empty() {
            out.push_str(&format!("   Link: {url}\n"));
        }
    }
    out.trim_end().to_string()
}

#[derive(Clone)]
struct NewsApi {
    api_key: Option<String>,
    base_url: String,
    http: reqwest::Client,
}

impl NewsApi {
    fn from_settings(settings: &ToolSettings) -> Self {
        Self {
            api_key: settings.resolve_news_key(),
            base_url: settings.news_base_url.trim_end_matches('/').to_string(),
            http: settings.http_client(),
        }
    }

    async fn articles(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Vec<Value>, ToolError> {
        let api_key = self.api_key.as_deref().ok_or(ToolError::MissingApiKey {
            service: SERVICE,
            env_var: NEWS_API_KEY_ENV,
        })?;

        let response = self
            .http
            .get(format!("{}/{endpoint}", self.base_url))
            .query(params)
            .query(&[("apiKey", api_key), ("pageSize", PAGE_SIZE)])
            .send()
            .await
            .map_err(|e| unavailable(SERVICE, e))?;

        let status = response.status();
        let data: Value = response.json().await.map_err(|e| unavailable(SERVICE, e))?;
        if !status.is_success() {
            let reason = data
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(unavailable(SERVICE, reason));
        }

        Ok(data
            .get("articles")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn headlines(&self, category: &str, country: &str) -> Result<String, ToolError> {
        let articles = self
            .articles(
                "top-headlines",
                &[("category", category), ("country", country)],
            )
            .await?;
        if articles.is_empty() {
            return Ok(format!("No headlines found for category: {category}"));
        }
        info!(category, country, "Top headlines fetched");
        Ok(format_articles(
            &articles,
            &format!("Top {} Headlines ({}):", title(category), country.to_uppercase()),
        ))
    }
}

fn title(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `get_news`: latest articles matching a query.
pub struct NewsTool {
    api: NewsApi,
}

impl NewsTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            api: NewsApi::from_settings(settings),
        }
    }
}

#[async_trait]
impl Tool for NewsTool {
    fn name(&self) -> &str {
        "get_news"
    }

    fn description(&self) -> &str {
        "Get the latest news articles for a search query or category. \
         Use this for current events and topics in the news."
    }

    fn parameters(&self) -> Value {
        schema_for::<NewsInput>()
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let input: NewsInput = parse_args(args)?;
        let query = input.query.trim();
        if query.is_empty() {
            return self.api.headlines(&input.category, &input.country).await;
        }

        let articles = self
            .api
            .articles(
                "everything",
                &[("q", query), ("sortBy", "publishedAt"), ("language", "en")],
            )
            .await?;
        if articles.is_empty() {
            return Ok(format!("No news articles found for: {query}"));
        }
        info!(query, "News data fetched");
        Ok(format_articles(&articles, &format!("Latest News for '{query}':")))
    }
}

/// `get_top_headlines`: top stories for a category and country.
pub struct TopHeadlinesTool {
    api: NewsApi,
}

impl TopHeadlinesTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            api: NewsApi::from_settings(settings),
        }
    }
}

#[async_trait]
impl Tool for TopHeadlinesTool {
    fn name(&self) -> &str {
        "get_top_headlines"
    }

    fn description(&self) -> &str {
        "Get top news headlines for a country or category. \
         Use this for general news and top stories."
    }

    fn parameters(&self) -> Value {
        schema_for::<HeadlinesInput>()
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let input: HeadlinesInput = parse_args(args)?;
        self.api.headlines(&input.category, &input.country).await
    }
}
