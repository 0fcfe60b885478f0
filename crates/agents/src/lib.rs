//! Capability handlers for Switchboard.
//!
//! Each handler implements [`switchboard_common::Handler`]:
//!
//! - **ResearchAgent**: web search, news and headlines
//! - **WeatherAgent**: current conditions and forecasts
//! - **GeneralAgent**: calculator, clock, conversation; also the fallback
//!
//! # Architecture
//!
//! ```text
//!             score(query)                 execute(query)
//!                  │                             │
//!                  ▼                             ▼
//!   ┌──────────────────────────┐   ┌──────────────────────────────┐
//!   │ keyword tables + regexes │   │ plan ─▶ tools ─▶ prompt ─▶ LLM │
//!   │   (pure, synchronous)    │   │        HandlerCore           │
//!   └──────────────────────────┘   └──────────────┬───────────────┘
//!                                                 ▼
//!                                    conversation window (10 msgs)
//! ```

pub mod general;
pub mod pipeline;
pub mod research;
pub mod scoring;
pub mod weather;
pub mod window;

use std::sync::Arc;

use switchboard_common::Handler;
use switchboard_tools::ToolSettings;

pub use pipeline::{HandlerCore, HandlerProfile, LlmSource, ToolCall, EMPTY_REPLY};
pub use general::GeneralAgent;
pub use research::ResearchAgent;
pub use weather::WeatherAgent;
pub use window::{ConversationWindow, DEFAULT_WINDOW};

/// The stock handler set in registration order: research, weather, general.
///
/// Order matters for tie-breaking during routing. `window` is the number of
/// chat messages each handler keeps.
pub fn default_handlers(
    llm: &LlmSource,
    tools: &ToolSettings,
    window: usize,
) -> Vec<Arc<dyn Handler>> {
    vec![
        Arc::new(ResearchAgent::new(llm.clone(), tools).with_window(window)),
        Arc::new(WeatherAgent::new(llm.clone(), tools).with_window(window)),
        Arc::new(GeneralAgent::new(llm.clone()).with_window(window)),
    ]
}
