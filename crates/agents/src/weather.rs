//! Weather handler: current conditions and forecasts.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use switchboard_common::{clamp_confidence, Confidence, Execution, Handler, HandlerStatus, Result};
use switchboard_tools::{Tool, ToolSettings, WeatherForecastTool, WeatherTool};

use crate::pipeline::{HandlerCore, HandlerProfile, LlmSource, ToolCall};
use crate::scoring::{any_match, compile, contains_any, KeywordTable};

pub const NAME: &str = "WeatherAgent";

const DESCRIPTION: &str = "I am a weather specialist agent. I can help you with current weather \
conditions for any location, weather forecasts for the next few days, temperature, humidity, \
wind speed and other weather data, and weather-related advice. I have access to real-time \
weather data from reliable sources.";

const TEMPERATURE: f32 = 0.3;

const DEFAULT_LOCATION: &str = "New York";

const WEATHER_KEYWORDS: KeywordTable = KeywordTable::new(
    &[
        "weather", "temperature", "rain", "snow", "sunny", "cloudy", "forecast", "humidity",
        "wind", "storm", "hot", "cold", "degrees", "celsius", "fahrenheit", "precipitation",
        "climate", "meteorology", "atmospheric", "barometric", "pressure",
    ],
    0.2,
    f32::MAX,
);

const LOCATION_BONUS: f32 = 0.3;
const FORECAST_BONUS: f32 = 0.2;

const FORECAST_TERMS: &[&str] = &["forecast", "tomorrow", "next week", "upcoming", "future"];

const FORECAST_INDICATORS: &[&str] = &[
    "forecast", "tomorrow", "next", "upcoming", "future", "will be", "going to be", "expect",
    "prediction", "days", "week", "weekend",
];

static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bin\s+([A-Za-z\s,]+)",
        r"\bat\s+([A-Za-z\s,]+)",
        r"\bfor\s+([A-Za-z\s,]+)",
        r"([A-Za-z\s,]+)\s+weather",
        r"weather\s+in\s+([A-Za-z\s,]+)",
    ])
});

/// Keyword evidence, +0.3 for a location phrase, +0.2 for forecast wording.
pub fn score_query(query: &str) -> f32 {
    let lower = query.to_lowercase();
    let mut score = WEATHER_KEYWORDS.score(&lower);
    if any_match(&LOCATION_PATTERNS, &lower) {
        score += LOCATION_BONUS;
    }
    if contains_any(&lower, FORECAST_TERMS) {
        score += FORECAST_BONUS;
    }
    score.min(1.0)
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// First location phrase in the query, title-cased, else `"New York"`.
pub fn extract_location(query: &str) -> String {
    let lower = query.to_lowercase();
    for pattern in LOCATION_PATTERNS.iter() {
        let Some(found) = pattern.captures(&lower).and_then(|c| c.get(1)) else {
            continue;
        };
        let cleaned: String = found
            .as_str()
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_' || *c == ',')
            .collect();
        if cleaned.chars().count() > 1 {
            return title_case(&cleaned);
        }
    }
    DEFAULT_LOCATION.to_string()
}

pub fn is_forecast_query(query: &str) -> bool {
    contains_any(&query.to_lowercase(), FORECAST_INDICATORS)
}

pub struct WeatherAgent {
    core: HandlerCore,
}

impl WeatherAgent {
    pub fn new(llm: LlmSource, tools: &ToolSettings) -> Self {
        Self::with_tools(
            llm,
            vec![
                Arc::new(WeatherTool::new(tools)),
                Arc::new(WeatherForecastTool::new(tools)),
            ],
        )
    }

    /// Construct with explicit tool implementations, e.g. stubs.
    pub fn with_tools(llm: LlmSource, tools: Vec<Arc<dyn Tool>>) -> Self {
        let profile = HandlerProfile {
            name: NAME.into(),
            description: DESCRIPTION.into(),
            temperature: TEMPERATURE,
        };
        Self {
            core: HandlerCore::new(profile, tools, llm),
        }
    }

    /// Keep `capacity` messages of conversation instead of the default.
    pub fn with_window(mut self, capacity: usize) -> Self {
        self.core = self.core.with_window(capacity);
        self
    }

    pub fn core(&self) -> &HandlerCore {
        &self.core
    }

    /// Forecast tool for forecast wording, current conditions otherwise.
    pub fn plan(&self, query: &str) -> Vec<ToolCall> {
        let tool = if is_forecast_query(query) {
            "get_weather_forecast"
        } else {
            "get_weather"
        };
        vec![ToolCall::new(
            tool,
            json!({ "location": extract_location(query), "units": "metric" }),
        )]
    }
}

#[async_trait]
impl Handler for WeatherAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn description(&self) -> &str {
        self.core.description()
    }

    fn tools(&self) -> Vec<String> {
        self.core.tool_names()
    }

    fn score(&self, query: &str) -> Result<Confidence> {
        Ok(clamp_confidence(score_query(query)))
    }

    async fn initialize(&self) -> Result<()> {
        self.core.initialize().await
    }

    async fn execute(&self, query: &str, context: Option<&Value>) -> Execution {
        self.core.run(query, context, self.plan(query)).await
    }

    fn status(&self) -> HandlerStatus {
        self.core.status()
    }
}
