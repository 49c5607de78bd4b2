//! Normalized evidence and findings.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A normalized fact extracted from a successful tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Sequence id, unique within the investigation.
    pub id: u64,
    /// Id of the call record that produced this item.
    pub record_id: u64,
    /// Name of the tool that produced this item.
    pub source: String,
    /// Round in which the producing call ran.
    pub round: u32,
    /// Event or record kind, e.g. `device.disconnected` or `UNLOCK_DOOR`.
    pub kind: String,
    /// When the event happened, if the payload says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// The record as returned by the tool.
    pub payload: Value,
}

impl EvidenceItem {
    /// Top-level payload field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Top-level payload field, if it is a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }
}

/// Observation about a tool result that drives follow-up selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum Finding {
    /// The device reports itself offline.
    DeviceOffline {
        /// Last time the device was seen.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        since: Option<DateTime<Utc>>,
    },
    /// The device reports itself online.
    DeviceOnline,
    /// Action attempts ended in failure.
    FailedActions {
        /// Failed attempts.
        count: usize,
        /// Failed attempts that touched access codes.
        access_code_related: usize,
    },
    /// Access codes were listed.
    AccessCodesFound {
        /// Codes returned.
        count: usize,
    },
    /// Some codes are not managed by the platform.
    UnmanagedCodes {
        /// Unmanaged codes.
        count: usize,
    },
    /// Connect or disconnect events were returned.
    ConnectivityEvents {
        /// Connectivity events.
        count: usize,
    },
    /// The tool paginated and more records exist.
    MoreDataAvailable {
        /// Limit the tool suggests for the next page.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggested_limit: Option<u64>,
    },
    /// Admin links were generated.
    AdminLinks {
        /// Links generated.
        count: usize,
    },
}

impl Finding {
    /// One-line description for key findings.
    pub fn describe(&self) -> String {
        match self {
            Self::DeviceOffline { since: Some(ts) } => {
                format!("Device is offline (last seen {})", ts.to_rfc3339())
            }
            Self::DeviceOffline { since: None } => "Device is offline".to_string(),
            Self::DeviceOnline => "Device is online".to_string(),
            Self::FailedActions { count, .. } => format!("{count} failed action attempts found"),
            Self::AccessCodesFound { count } => format!("Found {count} access codes"),
            Self::UnmanagedCodes { count } => format!("{count} unmanaged access codes found"),
            Self::ConnectivityEvents { count } => format!("Found {count} connectivity events"),
            Self::MoreDataAvailable { .. } => "More data available".to_string(),
            Self::AdminLinks { count } => format!("Generated {count} admin links"),
        }
    }
}

/// A finding together with the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcedFinding {
    /// Tool that produced the finding.
    pub tool: String,
    /// Call record the finding came from.
    pub record_id: u64,
    /// The finding itself.
    #[serde(flatten)]
    pub finding: Finding,
}

/// Parses the timestamp shapes seen in tool payloads.
///
/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS[.f]` (read as UTC), and unix
/// seconds given as a number.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

/// Parses a timestamp string; see [`parse_timestamp`].
pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let normalized = raw.replacen(' ', "T", 1);
    if let Ok(ts) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .map(|naive| naive.and_utc())
}
