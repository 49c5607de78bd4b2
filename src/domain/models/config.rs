//! Configuration model, deserialized by the config loader.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::budget::{Budget, BudgetProfile};

/// Main configuration structure for the investigator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Budget profile and per-field overrides
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Query parsing configuration
    #[serde(default)]
    pub parser: ParserConfig,

    /// Tool selection configuration
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Timeline and hypothesis configuration
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Reasoning engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Builtin tool configuration
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Budget configuration: a named profile plus optional overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetConfig {
    /// Named limits the overrides apply to
    #[serde(default)]
    pub profile: BudgetProfile,

    /// Overrides `max_rounds`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,

    /// Overrides `max_tools_per_round`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tools_per_round: Option<usize>,

    /// Overrides `max_total_tool_calls`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_tool_calls: Option<usize>,

    /// Overrides the deadline, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,

    /// Overrides the per-call timeout, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
}

impl BudgetConfig {
    /// Resolve the profile and apply overrides
    pub fn to_budget(&self) -> Budget {
        let mut budget = self.profile.budget();
        if let Some(rounds) = self.max_rounds {
            budget.max_rounds = rounds;
        }
        if let Some(tools) = self.max_tools_per_round {
            budget.max_tools_per_round = tools;
        }
        if let Some(calls) = self.max_total_tool_calls {
            budget.max_total_tool_calls = calls;
        }
        if let Some(secs) = self.deadline_secs {
            budget.deadline = Duration::from_secs(secs);
        }
        if let Some(secs) = self.call_timeout_secs {
            budget.call_timeout = Duration::from_secs(secs);
        }
        budget
    }
}

/// Query parser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParserConfig {
    /// Upper bound on the engine call while parsing
    #[serde(default = "default_engine_timeout_ms")]
    pub engine_timeout_ms: u64,

    /// Confidence below which the intent is treated as ambiguous
    #[serde(default = "default_ambiguity_threshold")]
    pub ambiguity_threshold: f64,

    /// Multiplier applied per entity kind with conflicting values
    #[serde(default = "default_ambiguity_penalty")]
    pub ambiguity_penalty: f64,
}

const fn default_engine_timeout_ms() -> u64 {
    5_000
}

const fn default_ambiguity_threshold() -> f64 {
    0.3
}

const fn default_ambiguity_penalty() -> f64 {
    0.8
}

impl ParserConfig {
    /// Engine timeout as a duration
    pub const fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            engine_timeout_ms: default_engine_timeout_ms(),
            ambiguity_threshold: default_ambiguity_threshold(),
            ambiguity_penalty: default_ambiguity_penalty(),
        }
    }
}

/// Tool selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SelectionConfig {
    /// Ask the reasoning engine for extra follow-ups after round 0
    #[serde(default)]
    pub engine_assist: bool,

    /// Timeout for engine tool proposals, in milliseconds
    #[serde(default = "default_engine_timeout_ms")]
    pub engine_timeout_ms: u64,

    /// Limit used when re-running a paginated tool
    #[serde(default = "default_followup_limit")]
    pub followup_limit: u64,

    /// Largest limit a follow-up may request
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
}

const fn default_followup_limit() -> u64 {
    50
}

const fn default_max_limit() -> u64 {
    100
}

impl SelectionConfig {
    /// Engine timeout as a duration
    pub const fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            engine_assist: false,
            engine_timeout_ms: default_engine_timeout_ms(),
            followup_limit: default_followup_limit(),
            max_limit: default_max_limit(),
        }
    }
}

/// Synthesis configuration: dedup threshold and confidence weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SynthesisConfig {
    /// Fraction of shared fields that must match for two events to merge
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Weight of the matched rule's specificity
    #[serde(default = "default_specificity_weight")]
    pub specificity_weight: f64,

    /// Weight of the corroboration score
    #[serde(default = "default_corroboration_weight")]
    pub corroboration_weight: f64,

    /// Corroborating items beyond this count add nothing
    #[serde(default = "default_corroboration_saturation")]
    pub corroboration_saturation: usize,

    /// Added when no evidence contradicts the hypothesis
    #[serde(default = "default_consistency_bonus")]
    pub consistency_bonus: f64,

    /// Subtracted per contradicting item
    #[serde(default = "default_contradiction_penalty")]
    pub contradiction_penalty: f64,

    /// 5xx responses from one provider needed to blame it
    #[serde(default = "default_min_provider_failures")]
    pub min_provider_failures: usize,

    /// Confidence reported for the unknown fallback
    #[serde(default = "default_unknown_confidence")]
    pub unknown_confidence: f64,
}

const fn default_similarity_threshold() -> f64 {
    0.6
}

const fn default_specificity_weight() -> f64 {
    0.6
}

const fn default_corroboration_weight() -> f64 {
    0.3
}

const fn default_corroboration_saturation() -> usize {
    5
}

const fn default_consistency_bonus() -> f64 {
    0.1
}

const fn default_contradiction_penalty() -> f64 {
    0.15
}

const fn default_min_provider_failures() -> usize {
    2
}

const fn default_unknown_confidence() -> f64 {
    0.1
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            specificity_weight: default_specificity_weight(),
            corroboration_weight: default_corroboration_weight(),
            corroboration_saturation: default_corroboration_saturation(),
            consistency_bonus: default_consistency_bonus(),
            contradiction_penalty: default_contradiction_penalty(),
            min_provider_failures: default_min_provider_failures(),
            unknown_confidence: default_unknown_confidence(),
        }
    }
}

/// Which reasoning engine backs parsing and tool proposals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Deterministic keyword classifier, no network access
    #[default]
    Keyword,
    /// Anthropic Messages API
    Anthropic,
}

/// Reasoning engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Engine implementation to use
    #[serde(default)]
    pub kind: EngineKind,

    /// API key (can also be set via ANTHROPIC_API_KEY env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name sent to the API
    #[serde(default = "default_anthropic_model")]
    pub model: String,

    /// Base URL for API (for testing/proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_engine_http_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

const fn default_engine_http_timeout_secs() -> u64 {
    30
}

const fn default_max_tokens() -> u32 {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            api_key: None,
            model: default_anthropic_model(),
            base_url: None,
            timeout_secs: default_engine_http_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Builtin tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolsConfig {
    /// Directory holding `<tool>.json` fixture payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures_dir: Option<String>,

    /// Base URL for generated admin links
    #[serde(default = "default_admin_base_url")]
    pub admin_base_url: String,

    /// `limit` passed to list tools in their first call
    #[serde(default = "default_page_limit")]
    pub default_limit: u64,
}

fn default_admin_base_url() -> String {
    "https://connect.getseam.com/admin".to_string()
}

const fn default_page_limit() -> u64 {
    10
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fixtures_dir: None,
            admin_base_url: default_admin_base_url(),
            default_limit: default_page_limit(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
