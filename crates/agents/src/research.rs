//! Research handler: web search and news.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use switchboard_common::{clamp_confidence, Confidence, Execution, Handler, HandlerStatus, Result};
use switchboard_tools::{NewsTool, Tool, ToolSettings, TopHeadlinesTool, WebSearchTool};

use crate::pipeline::{HandlerCore, HandlerProfile, LlmSource, ToolCall};
use crate::scoring::{compile, contains_any, squash_whitespace, KeywordTable};

pub const NAME: &str = "ResearchAgent";

const DESCRIPTION: &str = "I am a research specialist agent. I can help you with finding \
information on any topic through web search, getting the latest news and current events, \
researching facts, statistics and detailed information, and finding recent developments on \
topics. I have access to web search and news APIs to provide current information.";

const TEMPERATURE: f32 = 0.4;

const RESEARCH_KEYWORDS: KeywordTable = KeywordTable::new(
    &[
        "search", "find", "research", "information", "facts", "data", "statistics", "study",
        "report", "analysis", "details", "explain", "what is", "who is", "how does", "why does",
        "tell me about", "learn about", "know about",
    ],
    0.15,
    f32::MAX,
);

const NEWS_KEYWORDS: KeywordTable = KeywordTable::new(
    &[
        "news", "latest", "recent", "current", "today", "headlines", "breaking", "update",
        "happening", "events", "developments", "announcement", "report", "story", "article",
    ],
    0.2,
    f32::MAX,
);

const RESEARCH_INDICATORS: KeywordTable = KeywordTable::new(
    &[
        "information about", "details about", "facts about", "research on", "study of",
        "analysis of",
    ],
    0.25,
    f32::MAX,
);

const QUESTION_BONUS: f32 = 0.3;
const QUESTION_MARK_BONUS: f32 = 0.1;

static QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^what\s+is\s+",
        r"^who\s+is\s+",
        r"^how\s+does\s+",
        r"^why\s+does\s+",
        r"^when\s+did\s+",
        r"^where\s+is\s+",
        r"tell\s+me\s+about",
        r"explain\s+",
        r"find\s+information",
        r"search\s+for",
    ])
});

const NEWS_INDICATORS: &[&str] = &[
    "news", "latest", "recent", "current events", "headlines", "breaking", "today",
    "happening now", "updates",
];

const QUESTION_STARTERS: &[&str] = &[
    "what is", "who is", "how does", "why does", "when did", "where is", "tell me about",
    "explain", "find information about", "search for", "look up", "research",
];

/// Words that carry no topic once a query is known to be about news.
const NEWS_FILLER: &[&str] = &[
    "news", "latest", "recent", "current", "events", "headlines", "headline", "breaking",
    "today", "today's", "todays", "updates", "update", "happening", "now", "top", "the", "me",
    "show", "give", "get", "what", "what's", "whats", "are", "any", "on", "about", "in", "of",
    "for", "is", "there", "some", "please",
];

const NEWS_CATEGORIES: &[(&str, &[&str])] = &[
    ("business", &["business", "economy", "finance", "market", "stock", "company"]),
    ("technology", &["technology", "tech", "ai", "computer", "software", "internet"]),
    ("health", &["health", "medical", "medicine", "disease", "healthcare"]),
    ("science", &["science", "research", "discovery", "study", "scientific"]),
    ("sports", &["sports", "football", "basketball", "soccer", "game", "team"]),
    ("entertainment", &["entertainment", "movie", "music", "celebrity", "film"]),
];

pub fn score_query(query: &str) -> f32 {
    let lower = query.to_lowercase();
    let mut score = RESEARCH_KEYWORDS.score(&lower) + NEWS_KEYWORDS.score(&lower);
    // Only the first matching question form counts.
    if QUESTION_PATTERNS.iter().any(|p| p.is_match(&lower)) {
        score += QUESTION_BONUS;
    }
    score += RESEARCH_INDICATORS.score(&lower);
    if query.trim().ends_with('?') {
        score += QUESTION_MARK_BONUS;
    }
    score.min(1.0)
}

pub fn is_news_query(query: &str) -> bool {
    contains_any(&query.to_lowercase(), NEWS_INDICATORS)
}

/// Strip question starters and `?`; falls back to the raw query when
/// nothing is left.
pub fn extract_search_topic(query: &str) -> String {
    let mut clean = query.to_lowercase();
    for starter in QUESTION_STARTERS {
        clean = clean.replace(starter, "").trim().to_string();
    }
    let clean = squash_whitespace(&clean.replace('?', ""));
    if clean.is_empty() {
        query.to_string()
    } else {
        clean
    }
}

/// The subject of a news query, if it names one.
pub fn news_topic(query: &str) -> Option<String> {
    let topic = extract_search_topic(query).to_lowercase();
    let words: Vec<&str> = topic
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .filter(|w| !w.is_empty() && !NEWS_FILLER.iter().any(|f| f == w))
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

pub fn categorize_news_query(query: &str) -> &'static str {
    let lower = query.to_lowercase();
    NEWS_CATEGORIES
        .iter()
        .find(|(_, keywords)| contains_any(&lower, keywords))
        .map(|(category, _)| *category)
        .unwrap_or("general")
}

pub struct ResearchAgent {
    core: HandlerCore,
}

impl ResearchAgent {
    pub fn new(llm: LlmSource, tools: &ToolSettings) -> Self {
        Self::with_tools(
            llm,
            vec![
                Arc::new(WebSearchTool::new(tools)),
                Arc::new(NewsTool::new(tools)),
                Arc::new(TopHeadlinesTool::new(tools)),
            ],
        )
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

    pub fn plan(&self, query: &str) -> Vec<ToolCall> {
        if !is_news_query(query) {
            return vec![ToolCall::new(
                "web_search",
                json!({ "query": extract_search_topic(query), "num_results": 3 }),
            )];
        }

        let category = categorize_news_query(query);
        match news_topic(query) {
            Some(topic) => vec![ToolCall::new(
                "get_news",
                json!({ "query": topic, "category": category }),
            )],
            None => vec![ToolCall::new(
                "get_top_headlines",
                json!({ "category": category, "country": "us" }),
            )],
        }
    }
}

#[async_trait]
impl Handler for ResearchAgent {
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
