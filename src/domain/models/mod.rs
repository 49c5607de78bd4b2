//! Domain models for investigations.

pub mod budget;
pub mod config;
pub mod evidence;
pub mod intent;
pub mod record;
pub mod result;
pub mod state;
pub mod tool;

pub use budget::{Budget, BudgetProfile, DeadlineClock, RemainingBudget};
pub use config::{
    BudgetConfig, Config, EngineConfig, EngineKind, LoggingConfig, ParserConfig,
    SelectionConfig, SynthesisConfig, ToolsConfig,
};
pub use evidence::{parse_timestamp, EvidenceItem, Finding, SourcedFinding};
pub use intent::{EntityKind, EntityMap, Intent, InvestigationQuery, IssueCategory, TimeRange};
pub use record::{CacheStatus, CallOutcome, ToolCallRecord};
pub use result::{
    ErrorEntry, Hypothesis, IncompleteReason, InvestigationResult, ResultFlag, RootCause,
    StopReason, TimelineEntry,
};
pub use state::SchedulerState;
pub use tool::{
    ArgSource, ArgSpec, CacheKey, CanonicalArgs, SelectionReason, ToolInvocation, ToolRole,
    ToolSpec,
};
