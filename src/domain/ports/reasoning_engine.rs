//! Reasoning engine port - the single delegated-judgement capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::domain::errors::EngineError;
use crate::domain::models::{Intent, ToolSpec};

/// What the engine is being asked to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum EngineContext {
    /// Interpret a raw support question.
    ParseQuery {
        /// Question as submitted.
        query: String,
    },
    /// Suggest follow-up tools given what is known so far.
    ProposeTools {
        /// Parsed intent of the query.
        intent: Intent,
        /// Round about to be selected.
        round: u32,
        /// Findings so far, one line each.
        findings: Vec<String>,
        /// Tools already executed.
        tools_run: Vec<String>,
        /// Tools the engine may choose from.
        candidates: Vec<ToolSpec>,
    },
}

/// Engine reply. Untrusted: callers validate before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineChoice {
    /// Interpretation of a query.
    Intent(EngineIntent),
    /// Tools to run next.
    Tools {
        /// Proposals, in preference order.
        tools: Vec<ProposedTool>,
    },
}

/// Raw intent as reported by an engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineIntent {
    /// Issue category name.
    pub category: String,
    /// Entity field name (`device_ids`, `workspace_id`, ...) to values.
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<String>>,
    /// Raw time expressions.
    #[serde(default)]
    pub time_references: Vec<String>,
    /// Brands mentioned.
    #[serde(default)]
    pub device_brands: Vec<String>,
    /// Operations mentioned.
    #[serde(default)]
    pub operations: Vec<String>,
    /// Self-reported confidence, between 0 and 1.
    pub confidence: f64,
    /// One-line restatement.
    #[serde(default)]
    pub summary: String,
}

/// A tool suggested by the engine, with optional argument overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTool {
    /// Catalog name of the tool.
    pub name: String,
    /// Argument overrides applied on top of entity binding.
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ProposedTool {
    /// Proposal with no argument overrides.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Map::new(),
        }
    }
}

/// Trait for reasoning engine implementations.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &'static str;

    /// Answer one request. May fail or hang; callers bound it with a timeout.
    async fn propose(&self, context: &EngineContext) -> Result<EngineChoice, EngineError>;
}
