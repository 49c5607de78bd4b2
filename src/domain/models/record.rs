//! Tool call records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tool::ToolInvocation;
use crate::domain::errors::ToolError;

/// Whether a record was served from the investigation cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Answered from an earlier call with the same arguments.
    Hit,
    /// Executed against the tool.
    Miss,
}

/// Result of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum CallOutcome {
    /// Payload returned by the tool.
    Success(Value),
    /// Error returned by the tool, or raised on its behalf.
    Failure(ToolError),
}

impl CallOutcome {
    /// Payload, if the call succeeded.
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failure(_) => None,
        }
    }

    /// Error, if the call failed.
    pub const fn error(&self) -> Option<&ToolError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(err) => Some(err),
        }
    }

    /// Whether the call succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<Result<Value, ToolError>> for CallOutcome {
    fn from(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(err) => Self::Failure(err),
        }
    }
}

/// Append-only log entry for one resolved invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Sequence id, unique within the investigation.
    pub id: u64,
    /// What was called, and why.
    pub invocation: ToolInvocation,
    /// How the call ended.
    pub outcome: CallOutcome,
    /// When the call started, or when the cache was consulted.
    pub started_at: DateTime<Utc>,
    /// When the call finished.
    pub finished_at: DateTime<Utc>,
    /// Whether the outcome came from the cache.
    pub cache: CacheStatus,
}

impl ToolCallRecord {
    /// Name of the called tool.
    pub fn tool(&self) -> &str {
        &self.invocation.tool
    }

    /// Round the call belonged to.
    pub const fn round(&self) -> u32 {
        self.invocation.round
    }

    /// Whether the call succeeded.
    pub const fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Whether the outcome came from the cache.
    pub fn is_cache_hit(&self) -> bool {
        self.cache == CacheStatus::Hit
    }

    /// Wall-clock duration of the call.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
