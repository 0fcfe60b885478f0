//! General handler: arithmetic, the clock, small talk, and the last resort
//! for queries no specialist claims.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use switchboard_common::{clamp_confidence, Confidence, Execution, Handler, HandlerStatus, Result};
use switchboard_tools::{CalculatorTool, DateTimeTool, Tool};

use crate::pipeline::{HandlerCore, HandlerProfile, LlmSource, ToolCall};
use crate::scoring::{any_match, compile, contains_any, KeywordTable};

pub const NAME: &str = "GeneralAgent";

const DESCRIPTION: &str = "I am a general assistant agent. I can help you with mathematical \
calculations and problem solving, date and time information, general questions and \
conversation, and explanations. I'm here to help when other specialized agents aren't the \
best fit for your query.";

const TEMPERATURE: f32 = 0.7;

const MATH_KEYWORDS: KeywordTable = KeywordTable::new(
    &[
        "calculate", "compute", "math", "mathematics", "equation", "solve", "add", "subtract",
        "multiply", "divide", "percentage", "percent", "sum", "total", "average", "mean",
    ],
    0.2,
    0.8,
);

const TIME_KEYWORDS: KeywordTable = KeywordTable::new(
    &[
        "time", "date", "today", "now", "current", "when", "day", "month", "year", "hour",
        "minute", "clock",
    ],
    0.2,
    0.8,
);

const CONVERSATION_KEYWORDS: KeywordTable = KeywordTable::new(
    &[
        "hello", "hi", "hey", "thanks", "thank you", "help", "please", "can you", "would you",
        "how are you",
    ],
    0.1,
    0.5,
);

const EXPRESSION_BONUS: f32 = 0.6;

/// Score when no evidence matched, so this handler stays eligible.
pub const FALLBACK_FLOOR: f32 = 0.3;

const GREETINGS: &[&str] = &[
    "hello", "hi", "hey", "good morning", "good afternoon", "good evening", "how are you",
    "what's up",
];

const TIME_INDICATORS: &[&str] = &[
    "what time", "current time", "what date", "today", "now", "current date", "day is it",
    "time is it",
];

static MATH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\d+\s*[\+\-\*/]\s*\d+",
        r"\d+\s*%",
        r"[\+\-\*/\(\)]",
        r"\d+\.\d+",
    ])
});

static PERCENT_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*of\s+(\d+(?:\.\d+)?)")
        .expect("percent-of pattern must compile")
});

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\d.(][\d.\s+\-*/()%]*").expect("expression pattern must compile")
});

pub fn score_query(query: &str) -> f32 {
    let lower = query.to_lowercase();
    let mut score = MATH_KEYWORDS.score(&lower)
        + TIME_KEYWORDS.score(&lower)
        + CONVERSATION_KEYWORDS.score(&lower);
    if contains_math_expression(query) {
        score += EXPRESSION_BONUS;
    }
    if score == 0.0 {
        score = FALLBACK_FLOOR;
    }
    score.min(1.0)
}

pub fn contains_math_expression(query: &str) -> bool {
    any_match(&MATH_PATTERNS, query)
}

pub fn is_greeting(query: &str) -> bool {
    contains_any(query.trim().to_lowercase().as_str(), GREETINGS)
}

pub fn is_time_query(query: &str) -> bool {
    contains_any(&query.to_lowercase(), TIME_INDICATORS)
}

pub fn is_math_query(query: &str) -> bool {
    contains_math_expression(query) || MATH_KEYWORDS.matches(&query.to_lowercase()) > 0
}

/// Pull an evaluable expression out of free text.
///
/// `"X% of Y"` becomes `"X% * Y"`; otherwise the longest run of arithmetic
/// characters that contains an operator wins.
pub fn extract_expression(query: &str) -> Option<String> {
    if let Some(caps) = PERCENT_OF.captures(query) {
        return Some(format!("{}% * {}", &caps[1], &caps[2]));
    }

    EXPRESSION
        .find_iter(query)
        .map(|m| m.as_str().trim())
        .filter(|candidate| {
            candidate.chars().any(|c| c.is_ascii_digit())
                && candidate.chars().any(|c| "+-*/%".contains(c))
        })
        .max_by_key(|candidate| candidate.len())
        .map(str::to_string)
}

pub struct GeneralAgent {
    core: HandlerCore,
}

impl GeneralAgent {
    pub fn new(llm: LlmSource) -> Self {
        Self::with_tools(llm, vec![Arc::new(CalculatorTool), Arc::new(DateTimeTool)])
    }

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

    pub fn with_window(mut self, capacity: usize) -> Self {
        self.core = self.core.with_window(capacity);
        self
    }

    pub fn core(&self) -> &HandlerCore {
        &self.core
    }

    /// Calculator when an expression is present, clock for time questions.
    /// Greetings and everything else go straight to the model.
    pub fn plan(&self, query: &str) -> Vec<ToolCall> {
        let mut plan = Vec::new();
        if is_math_query(query) {
            if let Some(expression) = extract_expression(query) {
                plan.push(ToolCall::new("calculator", json!({ "expression": expression })));
            }
        }
        if is_time_query(query) {
            plan.push(ToolCall::new("get_datetime", json!({})));
        }
        plan
    }
}

#[async_trait]
impl Handler for GeneralAgent {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn floor_for_unmatched_queries() {
        assert_eq!(score_query("asdkjasd"), FALLBACK_FLOOR);
        assert_eq!(score_query("What's the weather in London?"), FALLBACK_FLOOR);
    }

    #[test]
    fn math_query_scores_keyword_and_expression() {
        // "calculate" 0.2 + percent expression 0.6
        assert!(approx(score_query("Calculate 15% of 250"), 0.8));
    }

    #[test]
    fn category_ceilings_apply() {
        // five math keywords cap at 0.8, the '+' operator adds 0.6, total capped at 1.0
        assert_eq!(score_query("calculate compute solve add sum 2+2"), 1.0);
        // ten conversation keywords cap at 0.5
        let chatty = "hello hi hey thanks thank you help please can you would you how are you";
        assert!(score_query(chatty) >= 0.5);
    }

    #[test]
    fn expression_detection() {
        assert!(contains_math_expression("what is 12 * 3"));
        assert!(contains_math_expression("a 50% discount"));
        assert!(contains_math_expression("pi is 3.14"));
        assert!(!contains_math_expression("no numbers here"));
    }

    #[test]
    fn greetings_time_and_math_queries() {
        assert!(is_greeting("  Good morning!"));
        assert!(!is_greeting("Compute 5 squared"));
        assert!(is_time_query("What time is it?"));
        assert!(!is_time_query("Tell me a joke"));
        assert!(is_math_query("what's the average of these"));
        assert!(is_math_query("7 / 2"));
    }

    #[test]
    fn expression_extraction() {
        assert_eq!(extract_expression("Calculate 15% of 250").as_deref(), Some("15% * 250"));
        assert_eq!(extract_expression("what is (2 + 3) * 4?").as_deref(), Some("(2 + 3) * 4"));
        assert_eq!(extract_expression("I have 3 cats"), None);
    }

    #[test]
    fn plan_picks_tools() {
        let agent = GeneralAgent::new(LlmSource::Settings(Default::default()));
        let plan = agent.plan("Calculate 15% of 250");
        assert_eq!(plan, vec![ToolCall::new("calculator", json!({"expression": "15% * 250"}))]);

        let plan = agent.plan("What time is it now?");
        assert_eq!(plan, vec![ToolCall::new("get_datetime", json!({}))]);

        assert!(agent.plan("hello there").is_empty());
    }
}
