//! Handler selection policy and routing decision types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchboard_common::Confidence;

use crate::config::RoutingConfig;

/// One handler's confidence for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerScore {
    pub handler: String,
    pub score: Confidence,
    /// Why the score was forced to 0.0, when the scorer faulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl HandlerScore {
    pub fn new(handler: impl Into<String>, score: Confidence) -> Self {
        Self {
            handler: handler.into(),
            score,
            fault: None,
        }
    }

    pub fn faulted(handler: impl Into<String>, fault: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            score: 0.0,
            fault: Some(fault.into()),
        }
    }
}

/// Outcome of [`select`], as an index into the scored slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Strict maximum at or above the threshold.
    Winner(usize),
    /// Nothing cleared the threshold; the configured fallback handler.
    Fallback(usize),
    /// Empty registry, or below threshold with no fallback registered.
    None,
}

impl Selection {
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Winner(i) | Self::Fallback(i) => Some(i),
            Self::None => None,
        }
    }
}

/// Pick a handler from scores listed in registration order.
///
/// The first handler holding the maximum wins ties.
pub fn select(scores: &[HandlerScore], policy: &RoutingConfig) -> Selection {
    let mut best: Option<usize> = None;
    for (i, candidate) in scores.iter().enumerate() {
        match best {
            Some(b) if candidate.score <= scores[b].score => {}
            _ => best = Some(i),
        }
    }

    let Some(best) = best else {
        return Selection::None;
    };

    if scores[best].score >= policy.threshold {
        return Selection::Winner(best);
    }

    policy
        .fallback_handler
        .as_deref()
        .and_then(|name| scores.iter().position(|s| s.handler == name))
        .map_or(Selection::None, Selection::Fallback)
}

/// Result of one routing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Selected handler name, `None` when nothing is eligible
    pub selected: Option<String>,

    /// Highest score observed, 0.0 for an empty registry
    pub best_score: Confidence,

    /// Whether the selection came from the fallback rule
    pub fallback: bool,

    /// Per-handler scores in registration order
    pub scores: Vec<HandlerScore>,

    pub timestamp: DateTime<Utc>,
}

impl RouteDecision {
    pub fn from_scores(scores: Vec<HandlerScore>, policy: &RoutingConfig) -> Self {
        let selection = select(&scores, policy);
        let best_score = scores.iter().map(|s| s.score).fold(0.0, f32::max);
        Self {
            selected: selection.index().map(|i| scores[i].handler.clone()),
            best_score,
            fallback: matches!(selection, Selection::Fallback(_)),
            scores,
            timestamp: Utc::now(),
        }
    }
}
