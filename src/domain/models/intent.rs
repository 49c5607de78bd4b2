//! Query and intent models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Broad category of a support question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// How a device behaves or is configured.
    DeviceBehavior,
    /// Something is failing and needs diagnosis.
    Troubleshooting,
    /// Questions about using the API.
    ApiHelp,
    /// Account, workspace or connected account problems.
    AccountIssue,
    /// No category could be determined.
    Unknown,
}

impl IssueCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::DeviceBehavior,
        Self::Troubleshooting,
        Self::ApiHelp,
        Self::AccountIssue,
        Self::Unknown,
    ];

    /// Snake_case name, as serialized.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceBehavior => "device_behavior",
            Self::Troubleshooting => "troubleshooting",
            Self::ApiHelp => "api_help",
            Self::AccountIssue => "account_issue",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown issue category: {s}"))
    }
}

/// Kind of identifier that can be extracted from a query or a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Device UUID.
    DeviceId,
    /// Workspace UUID.
    WorkspaceId,
    /// Connected account UUID.
    ConnectedAccountId,
    /// Access code UUID.
    AccessCodeId,
    /// Action attempt UUID.
    ActionAttemptId,
    /// Device id assigned by a third-party provider.
    ThirdPartyDeviceId,
    /// A numeric PIN such as `1234`.
    AccessCode,
}

impl EntityKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::DeviceId,
        Self::WorkspaceId,
        Self::ConnectedAccountId,
        Self::AccessCodeId,
        Self::ActionAttemptId,
        Self::ThirdPartyDeviceId,
        Self::AccessCode,
    ];

    /// Field name used in tool arguments and payloads.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceId => "device_id",
            Self::WorkspaceId => "workspace_id",
            Self::ConnectedAccountId => "connected_account_id",
            Self::AccessCodeId => "access_code_id",
            Self::ActionAttemptId => "action_attempt_id",
            Self::ThirdPartyDeviceId => "third_party_device_id",
            Self::AccessCode => "access_code",
        }
    }

    /// Accepts both singular and plural field names (`device_id`, `device_ids`).
    pub fn from_field(field: &str) -> Option<Self> {
        let field = field.trim().to_lowercase();
        let singular = field.strip_suffix('s').unwrap_or(&field);
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == field || k.as_str() == singular)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers grouped by kind, kept sorted for deterministic binding.
pub type EntityMap = BTreeMap<EntityKind, BTreeSet<String>>;

/// Inclusive time window mentioned in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Earliest timestamp.
    pub start: DateTime<Utc>,
    /// Latest timestamp.
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Smallest range covering every timestamp, if any.
    pub fn covering(timestamps: &[DateTime<Utc>]) -> Option<Self> {
        let start = timestamps.iter().min()?;
        let end = timestamps.iter().max()?;
        Some(Self {
            start: *start,
            end: *end,
        })
    }

    /// Whether `ts` falls inside the range, bounds included.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// The raw support question. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationQuery {
    /// Correlation id carried through logs and the result.
    pub id: Uuid,
    /// Question as submitted.
    pub text: String,
    /// When the query was received.
    pub received_at: DateTime<Utc>,
}

impl InvestigationQuery {
    /// Wraps `text` with a fresh id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// Structured interpretation of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Broad category.
    pub category: IssueCategory,
    /// Identifiers from the query, keyed by kind.
    pub entities: EntityMap,
    /// Window covered by absolute timestamps in the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    /// Raw time expressions such as "12:02 pm" or "yesterday".
    #[serde(default)]
    pub time_references: Vec<String>,
    /// Lock or sensor brands mentioned.
    #[serde(default)]
    pub device_brands: Vec<String>,
    /// Operations mentioned, such as `unlock` or `create_access_code`.
    #[serde(default)]
    pub operations: Vec<String>,
    /// One-line restatement of the question.
    #[serde(default)]
    pub summary: String,
    /// Confidence in the category, between 0 and 1.
    pub confidence: f64,
    /// Set when confidence fell below the ambiguity threshold.
    #[serde(default)]
    pub ambiguous: bool,
}

impl Intent {
    /// Intent with no usable interpretation.
    pub const fn unknown() -> Self {
        Self {
            category: IssueCategory::Unknown,
            entities: BTreeMap::new(),
            time_range: None,
            time_references: Vec::new(),
            device_brands: Vec::new(),
            operations: Vec::new(),
            summary: String::new(),
            confidence: 0.0,
            ambiguous: false,
        }
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_category(mut self, category: IssueCategory) -> Self {
        self.category = category;
        self
    }

    /// Adds one identifier.
    #[must_use]
    pub fn with_entity(mut self, kind: EntityKind, value: impl Into<String>) -> Self {
        self.entities.entry(kind).or_default().insert(value.into());
        self
    }

    /// Sets the confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Values extracted for `kind`, sorted.
    pub fn values(&self, kind: EntityKind) -> impl Iterator<Item = &str> {
        self.entities
            .get(&kind)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Smallest value extracted for `kind`.
    pub fn first(&self, kind: EntityKind) -> Option<&str> {
        self.values(kind).next()
    }

    /// Entity kinds with more than one distinct value.
    pub fn conflicting_kinds(&self) -> Vec<EntityKind> {
        self.entities
            .iter()
            .filter(|(_, values)| values.len() > 1)
            .map(|(kind, _)| *kind)
            .collect()
    }
}
