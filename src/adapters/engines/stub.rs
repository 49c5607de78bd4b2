//! Scripted reasoning engine for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::domain::errors::EngineError;
use crate::domain::ports::{EngineChoice, EngineContext, EngineIntent, ProposedTool, ReasoningEngine};

/// Answers every request with preconfigured replies.
pub struct StubReasoningEngine {
    intent: EngineIntent,
    proposals: Vec<ProposedTool>,
    failure: Option<EngineError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubReasoningEngine {
    /// An engine that classifies everything as `unknown` and proposes nothing.
    pub fn new() -> Self {
        Self {
            intent: EngineIntent {
                category: "unknown".to_string(),
                ..Default::default()
            },
            proposals: Vec::new(),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// An engine whose every call fails with `error`.
    pub fn failing(error: EngineError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }

    /// Intent returned for parse requests.
    #[must_use]
    pub fn with_intent(mut self, intent: EngineIntent) -> Self {
        self.intent = intent;
        self
    }

    /// Tools returned for proposal requests.
    #[must_use]
    pub fn with_proposals(mut self, proposals: Vec<ProposedTool>) -> Self {
        self.proposals = proposals;
        self
    }

    /// Sleeps before every reply.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StubReasoningEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningEngine for StubReasoningEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn propose(&self, context: &EngineContext) -> Result<EngineChoice, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(match context {
            EngineContext::ParseQuery { .. } => EngineChoice::Intent(self.intent.clone()),
            EngineContext::ProposeTools { .. } => EngineChoice::Tools {
                tools: self.proposals.clone(),
            },
        })
    }
}
