//! Keyword and pattern evidence shared by the handlers' scorers.
//!
//! All matching is substring based on the lower-cased query, so a keyword
//! like `"hi"` also matches inside `"this"`. Weights and ceilings are
//! hand-tuned constants that each handler declares next to its tables.

use regex::Regex;

/// A keyword set contributing `weight` per match, capped at `ceiling`.
#[derive(Debug, Clone, Copy)]
pub struct KeywordTable {
    pub keywords: &'static [&'static str],
    pub weight: f32,
    pub ceiling: f32,
}

impl KeywordTable {
    pub const fn new(keywords: &'static [&'static str], weight: f32, ceiling: f32) -> Self {
        Self {
            keywords,
            weight,
            ceiling,
        }
    }

    /// Number of keywords present in `lower`.
    pub fn matches(&self, lower: &str) -> usize {
        self.keywords.iter().filter(|k| lower.contains(*k)).count()
    }

    /// Capped evidence contributed by this table.
    pub fn score(&self, lower: &str) -> f32 {
        (self.matches(lower) as f32 * self.weight).min(self.ceiling)
    }
}

pub fn contains_any(lower: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| lower.contains(n))
}

pub fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

/// Compile a fixed pattern table.
///
/// Only called on string literals from this crate.
pub fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("handler pattern table must compile"))
        .collect()
}

/// Collapse runs of whitespace to single spaces.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
