//! Deterministic keyword classifier.
//!
//! Used when no model is configured. Scores each category by the number of
//! distinct cue phrases in the query; it never proposes follow-up tools.

use async_trait::async_trait;

use crate::domain::errors::EngineError;
use crate::domain::models::IssueCategory;
use crate::domain::ports::{EngineChoice, EngineContext, EngineIntent, ReasoningEngine};

/// Cue phrases per category. Earlier categories win ties.
const CUES: [(IssueCategory, &[&str]); 4] = [
    (
        IssueCategory::Troubleshooting,
        &[
            "not working",
            "stopped working",
            "doesn't work",
            "error",
            "fail",
            "offline",
            "stuck",
            "broken",
            "can't",
            "cannot",
            "won't",
            "disconnect",
            "issue",
            "problem",
        ],
    ),
    (
        IssueCategory::DeviceBehavior,
        &[
            "auto-lock",
            "autolock",
            "auto lock",
            "supposed to",
            "expected",
            "behavior",
            "behaviour",
            "battery",
            "will ",
            "does it",
            "after a few",
        ],
    ),
    (
        IssueCategory::ApiHelp,
        &[
            "api",
            "endpoint",
            "sdk",
            "webhook",
            "request",
            "parameter",
            "documentation",
            "docs",
        ],
    ),
    (
        IssueCategory::AccountIssue,
        &[
            "account",
            "billing",
            "invoice",
            "login",
            "log in",
            "permission",
            "invite",
            "subscription",
        ],
    ),
];

const BASE_CONFIDENCE: f64 = 0.5;
const CONFIDENCE_PER_CUE: f64 = 0.1;
const MAX_CUES: usize = 4;
const UNKNOWN_CONFIDENCE: f64 = 0.3;

/// Offline classifier driven by keyword cues.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordEngine;

impl KeywordEngine {
    /// Engine with the builtin cue table.
    pub fn new() -> Self {
        Self
    }

    /// Best category and its confidence for `query`.
    pub fn classify(&self, query: &str) -> (IssueCategory, f64) {
        let text = query.to_lowercase();
        let best = CUES
            .iter()
            .map(|(category, cues)| {
                let hits = cues.iter().filter(|cue| text.contains(*cue)).count();
                (*category, hits)
            })
            .fold(None::<(IssueCategory, usize)>, |best, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            });

        match best {
            Some((category, hits)) if hits > 0 => {
                let confidence = BASE_CONFIDENCE + CONFIDENCE_PER_CUE * hits.min(MAX_CUES) as f64;
                (category, confidence.min(0.9))
            }
            _ => (IssueCategory::Unknown, UNKNOWN_CONFIDENCE),
        }
    }
}

#[async_trait]
impl ReasoningEngine for KeywordEngine {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn propose(&self, context: &EngineContext) -> Result<EngineChoice, EngineError> {
        match context {
            EngineContext::ParseQuery { query } => {
                let (category, confidence) = self.classify(query);
                Ok(EngineChoice::Intent(EngineIntent {
                    category: category.as_str().to_string(),
                    confidence,
                    ..Default::default()
                }))
            }
            EngineContext::ProposeTools { .. } => Ok(EngineChoice::Tools { tools: Vec::new() }),
        }
    }
}
