//! Local clock readout.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{parse_args, schema_for, Tool, ToolError};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DateTimeInput {
    /// Optional free-form hint; ignored by the clock
    #[serde(default)]
    pub query: String,
}

/// Render the current time in `local` alongside UTC.
pub fn describe<Tz>(local: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let utc = local.with_timezone(&Utc);
    format!(
        "Current Date and Time:\n\n\
         Local Time: {}\n\
         UTC Time: {}\n\
         Day of Week: {}\n\
         Month: {}\n\
         Year: {}",
        local.format("%Y-%m-%d %H:%M:%S"),
        utc.format("%Y-%m-%d %H:%M:%S"),
        local.format("%A"),
        local.format("%B"),
        local.format("%Y"),
    )
}

/// `get_datetime`: current date, time and weekday.
#[derive(Debug, Default)]
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "get_datetime"
    }

    fn description(&self) -> &str {
        "Get current date and time information. Use this when users ask \
         about the current date, time or day of the week."
    }

    fn parameters(&self) -> Value {
        schema_for::<DateTimeInput>()
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        // Null and empty objects are both fine here.
        let _input: DateTimeInput = if args.is_null() {
            DateTimeInput::default()
        } else {
            parse_args(args)?
        };
        Ok(describe(&Local::now()))
    }
}
