//! Investigation result types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::evidence::EvidenceItem;
use super::intent::Intent;
use super::record::ToolCallRecord;
use super::state::SchedulerState;
use crate::domain::errors::ToolError;

/// Root-cause category of a hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RootCause {
    /// The device lost connectivity and actions failed as a result.
    Connectivity,
    /// A single upstream provider kept returning server errors.
    Provider {
        /// Provider name as reported by the tool.
        name: String,
    },
    /// Access codes on the device disagree with the platform.
    AccessCodeSync,
    /// Actions kept failing without a clearer cause.
    ActionFailure,
    /// No rule matched.
    Unknown,
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => f.write_str("connectivity"),
            Self::Provider { name } => write!(f, "provider ({name})"),
            Self::AccessCodeSync => f.write_str("access_code_sync"),
            Self::ActionFailure => f.write_str("action_failure"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// The synthesized explanation for the reported issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Category of the cause.
    pub root_cause: RootCause,
    /// One-sentence explanation.
    pub summary: String,
    /// Score between 0 and 1.
    pub confidence: f64,
    /// Name of the rule that matched.
    pub rule: String,
    /// Evidence item ids supporting the hypothesis.
    pub supporting: Vec<u64>,
    /// Evidence item ids contradicting it.
    pub contradicting: Vec<u64>,
}

impl Hypothesis {
    /// Fallback hypothesis used when no rule matches.
    pub fn unknown(confidence: f64) -> Self {
        Self {
            root_cause: RootCause::Unknown,
            summary: "Not enough evidence to determine a root cause".to_string(),
            confidence,
            rule: "fallback".to_string(),
            supporting: Vec::new(),
            contradicting: Vec::new(),
        }
    }
}

/// One timeline entry, possibly merged from several tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Surviving item, from the highest-priority source.
    #[serde(flatten)]
    pub item: EvidenceItem,
    /// Other sources that reported the same event.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corroborated_by: Vec<String>,
}

impl TimelineEntry {
    /// Entry with no corroborating sources yet.
    pub const fn new(item: EvidenceItem) -> Self {
        Self {
            item,
            corroborated_by: Vec::new(),
        }
    }
}

/// Why the scheduler stopped issuing rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The selection policy had nothing left to run.
    NoCandidates,
    /// `max_rounds` was reached.
    RoundsExhausted,
    /// `max_total_tool_calls` was reached.
    CallsExhausted,
    /// The wall-clock deadline passed.
    DeadlineExceeded,
}

impl StopReason {
    /// Why the result is incomplete, if it is.
    pub const fn incomplete_reason(&self) -> Option<IncompleteReason> {
        match self {
            Self::NoCandidates => None,
            Self::RoundsExhausted | Self::CallsExhausted => Some(IncompleteReason::BudgetExhausted),
            Self::DeadlineExceeded => Some(IncompleteReason::DeadlineExceeded),
        }
    }
}

/// Why an investigation stopped short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteReason {
    /// Rounds or total calls ran out.
    BudgetExhausted,
    /// The wall-clock deadline passed.
    DeadlineExceeded,
}

/// Non-fatal conditions surfaced alongside the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flag", content = "reason", rename_all = "snake_case")]
pub enum ResultFlag {
    /// Stopped before the selection policy ran dry.
    Incomplete(IncompleteReason),
    /// The query could not be interpreted confidently.
    ParseAmbiguity,
    /// At least one tool call failed.
    ToolErrors,
}

/// A tool failure surfaced in the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Record of the failed call.
    pub record_id: u64,
    /// Tool that failed.
    pub tool: String,
    /// Round of the failed call.
    pub round: u32,
    /// The failure.
    pub error: ToolError,
}

/// Final output of one investigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationResult {
    /// Correlation id of the query.
    pub investigation_id: Uuid,
    /// Query text as submitted.
    pub query: String,
    /// Parsed intent.
    pub intent: Intent,
    /// Deduplicated events, oldest first, untimestamped last.
    pub timeline: Vec<TimelineEntry>,
    /// Root-cause hypothesis.
    pub hypothesis: Hypothesis,
    /// Same as `hypothesis.confidence`.
    pub confidence: f64,
    /// Distinct findings, prefixed by tool.
    pub key_findings: Vec<String>,
    /// Non-fatal conditions.
    pub flags: Vec<ResultFlag>,
    /// Set when stopped by budget or deadline.
    pub incomplete: bool,
    /// Failed calls.
    pub errors: Vec<ErrorEntry>,
    /// Terminal scheduler state.
    pub final_state: SchedulerState,
    /// Why the scheduler stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Rounds that ran to completion.
    pub rounds_completed: u32,
    /// Calls actually executed, cache hits excluded.
    pub tool_calls_executed: usize,
    /// Invocations answered from the cache.
    pub cache_hits: usize,
    /// Every scheduler state entered, in order.
    pub state_trace: Vec<SchedulerState>,
    /// Every call record, in completion order.
    pub records: Vec<ToolCallRecord>,
    /// Wall-clock duration of the investigation.
    pub elapsed_ms: u64,
}

impl InvestigationResult {
    /// Whether `flag` was raised.
    pub fn has_flag(&self, flag: ResultFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Failures recorded for `tool`.
    pub fn errors_of<'a>(&'a self, tool: &'a str) -> impl Iterator<Item = &'a ErrorEntry> + 'a {
        self.errors.iter().filter(move |e| e.tool == tool)
    }
}
