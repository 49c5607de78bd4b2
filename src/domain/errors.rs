//! Domain errors for the investigation orchestrator.
//!
//! Only [`InvestigationError`] ever reaches the caller of an investigation.
//! Tool and engine failures are recorded as data inside the result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::SchedulerState;

/// Errors returned from an investigation entry point.
#[derive(Debug, Error)]
pub enum InvestigationError {
    /// Configuration was rejected before any tool ran.
    #[error("Fatal initialization error: {0}")]
    FatalInit(#[from] InitError),

    /// The scheduler attempted a transition its state machine forbids.
    #[error("Invalid scheduler transition from {from} to {to}")]
    InvalidStateTransition {
        /// State the scheduler was in.
        from: SchedulerState,
        /// State it tried to enter.
        to: SchedulerState,
    },

    /// The async runtime could not be used.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl InvestigationError {
    /// Whether the error was raised before any work started.
    pub const fn is_fatal_init(&self) -> bool {
        matches!(self, Self::FatalInit(_))
    }
}

/// Invalid configuration detected before an investigation starts.
#[derive(Debug, Error)]
pub enum InitError {
    /// The budget is unusable.
    #[error(transparent)]
    Budget(#[from] BudgetError),

    /// No tools were registered.
    #[error("Tool catalog is empty")]
    EmptyCatalog,
}

/// Budget values that can never produce a meaningful investigation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    /// No tool could ever run in a round.
    #[error("max_tools_per_round must be at least 1")]
    ZeroToolsPerRound,

    /// The investigation would expire immediately.
    #[error("deadline must be greater than zero")]
    ZeroDeadline,

    /// Every tool call would time out immediately.
    #[error("call_timeout must be greater than zero")]
    ZeroCallTimeout,
}

/// Errors raised while assembling the tool catalog at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Two tools share a name.
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    /// A tool was registered without a name.
    #[error("Tool name cannot be empty")]
    EmptyName,

    /// An argument name repeats within one tool spec.
    #[error("Tool '{tool}' declares argument '{arg}' more than once")]
    DuplicateArgument {
        /// Tool declaring the argument.
        tool: String,
        /// Repeated argument name.
        arg: String,
    },
}

/// Classification of a failed tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// The call exceeded its own timeout.
    Timeout,
    /// The call was abandoned because the investigation deadline passed.
    DeadlineExceeded,
    /// Credentials were rejected.
    Auth,
    /// The requested entity does not exist.
    NotFound,
    /// The provider behind the tool failed.
    Upstream,
    /// The arguments were rejected by the tool.
    InvalidArgs,
}

impl ToolErrorKind {
    /// Stable snake_case name, as serialized.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Upstream => "upstream",
            Self::InvalidArgs => "invalid_args",
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool failure, recorded as data in the call record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ToolError {
    /// Failure classification.
    pub kind: ToolErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// Upstream provider blamed for the failure, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// HTTP status reported by the provider, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ToolError {
    /// Creates an error with no provider attribution.
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            status: None,
        }
    }

    /// The call ran past `after`.
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ToolErrorKind::Timeout,
            format!("call exceeded {}ms", after.as_millis()),
        )
    }

    /// The call was cut off by the investigation deadline.
    pub fn deadline_exceeded() -> Self {
        Self::new(
            ToolErrorKind::DeadlineExceeded,
            "abandoned at investigation deadline",
        )
    }

    /// The requested entity does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message)
    }

    /// The tool rejected its arguments.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArgs, message)
    }

    /// The upstream provider failed.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Upstream, message)
    }

    /// Attributes the failure to `provider`.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Records the provider's HTTP status.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether the failure is a provider-side 5xx.
    pub fn is_server_error(&self) -> bool {
        self.kind == ToolErrorKind::Upstream && self.status.is_none_or(|s| s >= 500)
    }
}

/// Reasoning engine failures. Never fatal: callers fall back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No reply within the engine timeout.
    #[error("Engine timed out")]
    Timeout,

    /// The reply could not be interpreted.
    #[error("Engine returned a malformed response: {0}")]
    Malformed(String),

    /// The engine is not configured or cannot be reached.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// The engine answered with a non-success HTTP status.
    #[error("Engine HTTP error {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
}

/// Result type for investigation entry points.
pub type DomainResult<T> = Result<T, InvestigationError>;

impl From<BudgetError> for InvestigationError {
    fn from(err: BudgetError) -> Self {
        Self::FatalInit(InitError::Budget(err))
    }
}
