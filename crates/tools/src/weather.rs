//! Current conditions and forecast lookups against OpenWeatherMap.

use async_trait::async_trait;
use reqwest::StatusCode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{unavailable, ToolSettings, WEATHER_API_KEY_ENV};
use crate::{parse_args, schema_for, Tool, ToolError};

const SERVICE: &str = "Weather";
const FORECAST_SLOTS: usize = 5;

/// Input for the weather tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WeatherInput {
    /// City name or location to get weather for
    pub location: String,

    /// Units for temperature: metric, imperial or kelvin
    #[serde(default = "default_units")]
    pub units: String,
}

fn default_units() -> String {
    "metric".into()
}

fn temperature_symbol(units: &str) -> &'static str {
    match units {
        "imperial" => "°F",
        "kelvin" | "standard" => "K",
        _ => "°C",
    }
}

fn wind_unit(units: &str) -> &'static str {
    if units == "imperial" {
        "mph"
    } else {
        "m/s"
    }
}

/// OpenWeatherMap uses "standard" for kelvin.
fn api_units(units: &str) -> &str {
    if units == "kelvin" {
        "standard"
    } else {
        units
    }
}

/// Shared OpenWeatherMap access for both tools.
#[derive(Clone)]
struct OpenWeatherMap {
    api_key: Option<String>,
    base_url: String,
    http: reqwest::Client,
}

impl OpenWeatherMap {
    fn from_settings(settings: &ToolSettings) -> Self {
        Self {
            api_key: settings.resolve_weather_key(),
            base_url: settings.weather_base_url.trim_end_matches('/').to_string(),
            http: settings.http_client(),
        }
    }

    async fn fetch(&self, endpoint: &str, input: &WeatherInput) -> Result<Value, ToolError> {
        let api_key = self.api_key.as_deref().ok_or(ToolError::MissingApiKey {
            service: SERVICE,
            env_var: WEATHER_API_KEY_ENV,
        })?;

        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", input.location.as_str()),
                ("appid", api_key),
                ("units", api_units(&input.units)),
            ])
            .send()
            .await
            .map_err(|e| unavailable(SERVICE, e))?;

        match response.status() {
            StatusCode::OK => response.json().await.map_err(|e| unavailable(SERVICE, e)),
            StatusCode::NOT_FOUND => {
                warn!(location = %input.location, "Location not found");
                Err(ToolError::LocationNotFound(input.location.clone()))
            }
            status => Err(unavailable(SERVICE, format!("HTTP {status}"))),
        }
    }
}

fn field(value: &Value, pointer: &str) -> String {
    match value.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "N/A".to_string(),
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a current-conditions payload.
pub fn format_current(data: &Value, location: &str, units: &str) -> String {
    let symbol = temperature_symbol(units);
    format!(
        "Current Weather for {location}:\n\n\
         Temperature: {temp}{symbol} (feels like {feels}{symbol})\n\
         Conditions: {conditions}\n\
         Humidity: {humidity}%\n\
         Wind Speed: {wind} {wind_unit}\n\
         Pressure: {pressure} hPa",
        temp = field(data, "/main/temp"),
        feels = field(data, "/main/feels_like"),
        conditions = title_case(&field(data, "/weather/0/description")),
        humidity = field(data, "/main/humidity"),
        wind = field(data, "/wind/speed"),
        wind_unit = wind_unit(units),
        pressure = field(data, "/main/pressure"),
    )
}

/// Render the first few slots of a forecast payload.
pub fn format_forecast(data: &Value, location: &str, units: &str) -> String {
    let slots = data
        .get("list")
        .and_then(Value::as_array)
        .map(|list| &list[..list.len().min(FORECAST_SLOTS)])
        .unwrap_or(&[]);

    if slots.is_empty() {
        return format!("No forecast data available for {location}");
    }

    let symbol = temperature_symbol(units);
    let mut out = format!("Weather Forecast for {location}:\n");
    for (i, slot) in slots.iter().enumerate() {
        let when = match slot.get("dt_txt").and_then(Value::as_str) {
            Some(stamp) => stamp.to_string(),
            None => format!("Period {}", i + 1),
        };
        out.push_str(&format!(
            "\n{when}: {}{symbol} - {}",
            field(slot, "/main/temp"),
            title_case(&field(slot, "/weather/0/description")),
        ));
    }
    out
}

/// `get_weather`: current conditions for a location.
pub struct WeatherTool {
    api: OpenWeatherMap,
}

impl WeatherTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            api: OpenWeatherMap::from_settings(settings),
        }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get current weather information for a specific location. \
         Use this when users ask about weather conditions or temperature."
    }

    fn parameters(&self) -> Value {
        schema_for::<WeatherInput>()
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let input: WeatherInput = parse_args(args)?;
        let data = self.api.fetch("weather", &input).await?;
        info!(location = %input.location, "Weather data fetched");
        Ok(format_current(&data, &input.location, &input.units))
    }
}

/// `get_weather_forecast`: upcoming forecast slots for a location.
pub struct WeatherForecastTool {
    api: OpenWeatherMap,
}

impl WeatherForecastTool {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            api: OpenWeatherMap::from_settings(settings),
        }
    }
}

#[async_trait]
impl Tool for WeatherForecastTool {
    fn name(&self) -> &str {
        "get_weather_forecast"
    }

    fn description(&self) -> &str {
        "Get the weather forecast for a specific location. \
         Use this when users ask about future weather."
    }

    fn parameters(&self) -> Value {
        schema_for::<WeatherInput>()
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let input: WeatherInput = parse_args(args)?;
        let data = self.api.fetch("forecast", &input).await?;
        info!(location = %input.location, "Forecast data fetched");
        Ok(format_forecast(&data, &input.location, &input.units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keyless_settings() -> ToolSettings {
        ToolSettings {
            weather_api_key: None,
            // Point somewhere unroutable so a missing-key bug would not hit the network.
            weather_base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        }
    }

    #[test]
    fn current_conditions_rendering() {
        let data = json!({
            "main": {"temp": 14.2, "feels_like": 13.1, "humidity": 81, "pressure": 1012},
            "weather": [{"description": "light rain"}],
            "wind": {"speed": 4.6}
        });
        let text = format_current(&data, "London", "metric");
        assert!(text.starts_with("Current Weather for London:"));
        assert!(text.contains("Temperature: 14.2°C (feels like 13.1°C)"));
        assert!(text.contains("Conditions: Light Rain"));
        assert!(text.contains("Humidity: 81%"));
        assert!(text.contains("Wind Speed: 4.6 m/s"));
    }

    #[test]
    fn missing_fields_render_as_na() {
        let text = format_current(&json!({}), "Nowhere", "imperial");
        assert!(text.contains("Temperature: N/A°F"));
        assert!(text.contains("Wind Speed: N/A mph"));
    }

    #[test]
    fn forecast_rendering_keeps_first_five_slots() {
        let slots: Vec<Value> = (0..8)
            .map(|i| {
                json!({
                    "dt_txt": format!("2024-05-0{} 12:00:00", i + 1),
                    "main": {"temp": 10 + i},
                    "weather": [{"description": "clear sky"}]
                })
            })
            .collect();
        let text = format_forecast(&json!({ "list": slots }), "Paris", "metric");
        assert!(text.contains("2024-05-01 12:00:00: 10°C - Clear Sky"));
        assert!(text.contains("2024-05-05 12:00:00: 14°C"));
        assert!(!text.contains("2024-05-06"));
    }

    #[test]
    fn empty_forecast_message() {
        let text = format_forecast(&json!({"list": []}), "Paris", "metric");
        assert_eq!(text, "No forecast data available for Paris");
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let tool = WeatherTool::new(&keyless_settings());
        if tool.api.api_key.is_some() {
            // WEATHER_API_KEY is exported in this environment.
            return;
        }
        let err = tool.call(json!({"location": "London"})).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingApiKey { .. }));
    }

    #[tokio::test]
    async fn bad_arguments_are_typed() {
        let tool = WeatherForecastTool::new(&keyless_settings());
        let err = tool.call(json!({"city": "London"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
