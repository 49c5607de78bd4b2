//! Turns raw tool payloads into evidence items, discovered entities and findings.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::domain::models::{parse_timestamp, EntityKind, Finding, ToolRole, ToolSpec};

/// Payload keys holding a list of events or records.
const COLLECTION_FIELDS: [&str; 7] = [
    "events",
    "device_events",
    "action_attempts",
    "audit_logs",
    "access_codes",
    "items",
    "results",
];

/// Payload keys holding an event time, in order of preference.
pub(crate) const TIMESTAMP_FIELDS: [&str; 6] = [
    "occurred_at",
    "timestamp",
    "created_at",
    "last_seen",
    "updated_at",
    "time",
];

/// Payload keys naming the event or action kind.
pub(crate) const KIND_FIELDS: [&str; 3] = ["kind", "event_type", "action_type"];

const FAILED_STATUSES: [&str; 3] = ["error", "failed", "failure"];

/// A single item before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    /// Event or record kind.
    pub kind: String,
    /// Event time, if present.
    pub timestamp: Option<DateTime<Utc>>,
    /// The record as returned.
    pub payload: Value,
}

/// Everything extracted from one successful payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// One item per record.
    pub items: Vec<NormalizedItem>,
    /// Identifiers found in the payload.
    pub entities: Vec<(EntityKind, String)>,
    /// Observations that may drive follow-ups.
    pub findings: Vec<Finding>,
}

/// Stateless payload normalizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceNormalizer;

impl EvidenceNormalizer {
    /// Splits `payload` into items, entities and findings.
    pub fn normalize(&self, spec: &ToolSpec, payload: &Value) -> Normalized {
        let mut out = Normalized::default();

        match collection(payload) {
            Some((field, elements)) => {
                for element in elements {
                    out.items.push(item_from(element, spec.role));
                }
                collection_findings(field, elements, &mut out.findings);
            }
            None => out.items.push(item_from(payload, spec.role)),
        }

        if let Some(object) = payload.as_object() {
            discover_entities(object, &mut out.entities);
            if let Some(props) = object.get("properties").and_then(Value::as_object) {
                discover_entities(props, &mut out.entities);
            }
        }
        status_findings(payload, &mut out.findings);

        out
    }
}

fn collection(payload: &Value) -> Option<(&'static str, &Vec<Value>)> {
    COLLECTION_FIELDS
        .iter()
        .find_map(|field| payload.get(field).and_then(Value::as_array).map(|a| (*field, a)))
}

fn item_from(value: &Value, role: ToolRole) -> NormalizedItem {
    let kind = KIND_FIELDS
        .iter()
        .find_map(|f| value.get(f).and_then(Value::as_str))
        .unwrap_or_else(|| role.default_kind())
        .to_string();
    NormalizedItem {
        kind,
        timestamp: timestamp_of(value),
        payload: value.clone(),
    }
}

/// First parseable timestamp at the top level, then under `properties`.
pub fn timestamp_of(value: &Value) -> Option<DateTime<Utc>> {
    let direct = TIMESTAMP_FIELDS
        .iter()
        .find_map(|f| value.get(f).and_then(parse_timestamp));
    direct.or_else(|| {
        let props = value.get("properties")?;
        TIMESTAMP_FIELDS
            .iter()
            .find_map(|f| props.get(f).and_then(parse_timestamp))
    })
}

fn discover_entities(object: &Map<String, Value>, out: &mut Vec<(EntityKind, String)>) {
    for kind in EntityKind::ALL {
        if let Some(value) = object.get(kind.as_str()).and_then(Value::as_str) {
            if !value.is_empty() {
                out.push((kind, value.to_string()));
            }
        }
    }
}

/// Whether a record reports a failed status.
pub fn is_failed_status(value: &Value) -> bool {
    value
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| FAILED_STATUSES.contains(&s.to_lowercase().as_str()))
}

/// Online flag at the top level or under `properties`.
pub fn online_flag(value: &Value) -> Option<bool> {
    value
        .get("online")
        .or_else(|| value.get("properties").and_then(|p| p.get("online")))
        .and_then(Value::as_bool)
}

/// Whether an action record concerns access codes.
pub fn is_access_code_action(value: &Value) -> bool {
    value
        .get("action_type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.to_uppercase().contains("ACCESS_CODE"))
}

fn collection_findings(field: &str, elements: &[Value], findings: &mut Vec<Finding>) {
    let failed: Vec<&Value> = elements.iter().filter(|e| is_failed_status(e)).collect();
    if !failed.is_empty() {
        findings.push(Finding::FailedActions {
            count: failed.len(),
            access_code_related: failed.iter().filter(|e| is_access_code_action(e)).count(),
        });
    }

    if field == "access_codes" && !elements.is_empty() {
        findings.push(Finding::AccessCodesFound {
            count: elements.len(),
        });
        let unmanaged = elements
            .iter()
            .filter(|e| e.get("is_managed").and_then(Value::as_bool) == Some(false))
            .count();
        if unmanaged > 0 {
            findings.push(Finding::UnmanagedCodes { count: unmanaged });
        }
    }

    let connectivity = elements
        .iter()
        .filter(|e| {
            KIND_FIELDS
                .iter()
                .find_map(|f| e.get(f).and_then(Value::as_str))
                .is_some_and(is_connectivity_kind)
        })
        .count();
    if connectivity > 0 {
        findings.push(Finding::ConnectivityEvents {
            count: connectivity,
        });
    }
}

fn status_findings(payload: &Value, findings: &mut Vec<Finding>) {
    match online_flag(payload) {
        Some(false) => findings.push(Finding::DeviceOffline {
            since: timestamp_of(payload),
        }),
        Some(true) => findings.push(Finding::DeviceOnline),
        None => {}
    }

    if let Some(pagination) = payload.get("pagination") {
        if pagination.get("has_more").and_then(Value::as_bool) == Some(true) {
            findings.push(Finding::MoreDataAvailable {
                suggested_limit: pagination
                    .get("suggested_next_limit")
                    .and_then(Value::as_u64),
            });
        }
    }

    if let Some(links) = payload.get("admin_links").and_then(Value::as_array) {
        findings.push(Finding::AdminLinks { count: links.len() });
    }
}

/// Whether an event kind is about connectivity.
pub fn is_connectivity_kind(kind: &str) -> bool {
    let kind = kind.to_lowercase();
    ["connect", "online", "offline"].iter().any(|k| kind.contains(k))
}

/// Whether an event kind reports the device going away.
pub fn is_offline_kind(kind: &str) -> bool {
    let kind = kind.to_lowercase();
    kind.contains("disconnect") || kind.contains("offline")
}
