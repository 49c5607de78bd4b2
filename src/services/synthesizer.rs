//! Builds the timeline and root-cause hypothesis from collected evidence.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::ToolError;
use crate::domain::models::{
    EvidenceItem, Finding, Hypothesis, RootCause, SynthesisConfig, TimelineEntry, ToolRole,
};
use crate::services::catalog::ToolCatalog;
use crate::services::evidence_store::EvidenceStore;
use crate::services::normalizer::{
    is_access_code_action, is_connectivity_kind, is_failed_status, is_offline_kind, online_flag,
    KIND_FIELDS, TIMESTAMP_FIELDS,
};

/// Synthesizer output, assembled into the final result by the investigator.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Deduplicated, ordered events.
    pub timeline: Vec<TimelineEntry>,
    /// Root-cause hypothesis.
    pub hypothesis: Hypothesis,
    /// Distinct findings, prefixed by tool.
    pub key_findings: Vec<String>,
}

/// A matched rule before confidence scoring.
struct Candidate {
    root_cause: RootCause,
    rule: &'static str,
    summary: String,
    specificity: f64,
    supporting: Vec<u64>,
    contradicting: Vec<u64>,
    /// Independent observations backing the match beyond the first.
    corroborating: usize,
}

/// Turns an evidence store into a timeline and hypothesis.
pub struct Synthesizer {
    catalog: Arc<ToolCatalog>,
    config: SynthesisConfig,
}

impl Synthesizer {
    /// Synthesizer ranking sources by catalog priority.
    pub fn new(catalog: Arc<ToolCatalog>, config: SynthesisConfig) -> Self {
        Self { catalog, config }
    }

    /// Timeline, hypothesis and key findings for `evidence`.
    pub fn synthesize(&self, evidence: &EvidenceStore) -> Synthesis {
        let timeline = self.timeline(evidence.items());
        let hypothesis = self.hypothesis(&timeline, evidence);
        debug!(
            timeline = timeline.len(),
            rule = %hypothesis.rule,
            confidence = hypothesis.confidence,
            "synthesis complete"
        );
        Synthesis {
            timeline,
            hypothesis,
            key_findings: key_findings(evidence),
        }
    }

    /// Merge duplicate events, then order the survivors.
    pub fn timeline(&self, items: &[EvidenceItem]) -> Vec<TimelineEntry> {
        let mut entries: Vec<TimelineEntry> = Vec::with_capacity(items.len());

        for item in items {
            let duplicate = entries
                .iter_mut()
                .find(|entry| self.is_duplicate(&entry.item, item));
            match duplicate {
                Some(entry) => self.merge(entry, item),
                None => entries.push(TimelineEntry::new(item.clone())),
            }
        }

        let (mut timed, mut untimed): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| e.item.timestamp.is_some());
        timed.sort_by_key(|e| e.item.timestamp);
        untimed.sort_by(|a, b| {
            a.item
                .source
                .cmp(&b.item.source)
                .then_with(|| a.item.id.cmp(&b.item.id))
        });
        timed.extend(untimed);
        timed
    }

    fn is_duplicate(&self, kept: &EvidenceItem, candidate: &EvidenceItem) -> bool {
        let (Some(a), Some(b)) = (kept.timestamp, candidate.timestamp) else {
            return false;
        };
        kept.kind == candidate.kind
            && round_to_second(a) == round_to_second(b)
            && similarity(&kept.payload, &candidate.payload) >= self.config.similarity_threshold
    }

    /// Keep the higher-priority source; the other becomes corroboration.
    fn merge(&self, entry: &mut TimelineEntry, incoming: &EvidenceItem) {
        let demoted = if self.catalog.priority(&incoming.source)
            > self.catalog.priority(&entry.item.source)
        {
            std::mem::replace(&mut entry.item, incoming.clone()).source
        } else {
            incoming.source.clone()
        };
        if demoted != entry.item.source && !entry.corroborated_by.contains(&demoted) {
            entry.corroborated_by.push(demoted);
        }
        entry.corroborated_by.retain(|s| *s != entry.item.source);
    }

    fn hypothesis(&self, timeline: &[TimelineEntry], evidence: &EvidenceStore) -> Hypothesis {
        let view = TimelineView::new(timeline, &self.catalog);
        let candidate = self
            .connectivity(&view)
            .or_else(|| self.provider(&view, evidence))
            .or_else(|| access_code_sync(&view))
            .or_else(|| weak_connectivity(&view))
            .or_else(|| action_failure(&view));

        match candidate {
            Some(candidate) => {
                let confidence = self.confidence(&candidate);
                Hypothesis {
                    root_cause: candidate.root_cause,
                    summary: candidate.summary,
                    confidence,
                    rule: candidate.rule.to_string(),
                    supporting: candidate.supporting,
                    contradicting: candidate.contradicting,
                }
            }
            None if timeline.is_empty() => Hypothesis::unknown(0.0),
            None => Hypothesis::unknown(self.config.unknown_confidence),
        }
    }

    fn confidence(&self, candidate: &Candidate) -> f64 {
        let c = &self.config;
        let saturation = c.corroboration_saturation.max(1);
        let corroboration = candidate.corroborating.min(saturation) as f64 / saturation as f64;
        let consistency = if candidate.contradicting.is_empty() {
            c.consistency_bonus
        } else {
            0.0
        };
        let score = candidate.specificity * c.specificity_weight
            + corroboration * c.corroboration_weight
            + consistency
            - candidate.contradicting.len() as f64 * c.contradiction_penalty;
        score.clamp(0.0, 1.0)
    }

    /// Offline since T and failed actions at or after T.
    fn connectivity(&self, view: &TimelineView<'_>) -> Option<Candidate> {
        let since = view.offline.iter().filter_map(|e| e.item.timestamp).min()?;
        let failed: Vec<&TimelineEntry> = view
            .failed_actions
            .iter()
            .copied()
            .filter(|e| e.item.timestamp.is_some_and(|t| t >= since))
            .collect();
        if failed.is_empty() {
            return None;
        }

        let contradicting = view
            .entries
            .iter()
            .filter(|e| e.item.timestamp.is_some_and(|t| t > since))
            .filter(|e| is_online_signal(&e.item) || (view.is_action(e) && is_success(&e.item)))
            .map(|e| e.item.id)
            .collect();
        let supporting: Vec<&TimelineEntry> =
            view.offline.iter().chain(failed.iter()).copied().collect();

        Some(Candidate {
            root_cause: RootCause::Connectivity,
            rule: "connectivity",
            summary: format!(
                "Device went offline at {} and {} action attempts failed afterwards",
                since.to_rfc3339(),
                failed.len()
            ),
            specificity: 0.8,
            corroborating: corroboration(&supporting),
            supporting: supporting.iter().map(|e| e.item.id).collect(),
            contradicting,
        })
    }

    /// Server errors attributed to one provider across separate calls.
    ///
    /// Counts distinct call records, so one call reporting several 5xx
    /// events is a single observation.
    fn provider(&self, view: &TimelineView<'_>, evidence: &EvidenceStore) -> Option<Candidate> {
        let mut calls: BTreeMap<&str, BTreeSet<u64>> = BTreeMap::new();
        for item in evidence.items() {
            if let Some(provider) = server_error_provider(&item.payload) {
                calls.entry(provider).or_default().insert(item.record_id);
            }
        }
        for record in evidence.failures() {
            if let Some(provider) = record.outcome.error().and_then(upstream_provider) {
                calls.entry(provider).or_default().insert(record.id);
            }
        }

        let (name, count) = calls
            .into_iter()
            .map(|(name, records)| (name, records.len()))
            .filter(|(_, count)| *count >= self.config.min_provider_failures)
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))?;
        let ids = view
            .entries
            .iter()
            .filter(|e| server_error_provider(&e.item.payload) == Some(name))
            .map(|e| e.item.id)
            .collect();
        let name = name.to_string();

        Some(Candidate {
            summary: format!("Provider {name} returned {count} server errors"),
            root_cause: RootCause::Provider { name },
            rule: "provider",
            specificity: 0.75,
            supporting: ids,
            contradicting: Vec::new(),
            corroborating: count.saturating_sub(1),
        })
    }
}

/// Unmanaged codes plus failed access-code actions.
fn access_code_sync(view: &TimelineView<'_>) -> Option<Candidate> {
    let unmanaged: Vec<&TimelineEntry> = view
        .entries
        .iter()
        .copied()
        .filter(|e| e.item.field("is_managed").and_then(Value::as_bool) == Some(false))
        .collect();
    let failed: Vec<&TimelineEntry> = view
        .failed_actions
        .iter()
        .copied()
        .filter(|e| is_access_code_action(&e.item.payload))
        .collect();
    if unmanaged.is_empty() || failed.is_empty() {
        return None;
    }
    let supporting: Vec<&TimelineEntry> = unmanaged.iter().chain(failed.iter()).copied().collect();
    Some(Candidate {
        root_cause: RootCause::AccessCodeSync,
        rule: "access_code_sync",
        summary: format!(
            "{} unmanaged access codes alongside {} failed access code actions",
            unmanaged.len(),
            failed.len()
        ),
        specificity: 0.7,
        corroborating: corroboration(&supporting),
        supporting: supporting.iter().map(|e| e.item.id).collect(),
        contradicting: Vec::new(),
    })
}

fn weak_connectivity(view: &TimelineView<'_>) -> Option<Candidate> {
    if view.offline.is_empty() {
        return None;
    }
    let offline_at = view.offline.iter().filter_map(|e| e.item.timestamp).min();
    let contradicting = view
        .entries
        .iter()
        .filter(|e| is_online_signal(&e.item))
        .filter(|e| match (offline_at, e.item.timestamp) {
            (Some(since), Some(t)) => t > since,
            _ => false,
        })
        .map(|e| e.item.id)
        .collect();
    Some(Candidate {
        root_cause: RootCause::Connectivity,
        rule: "connectivity_weak",
        summary: "Device is offline; no failed actions were observed".to_string(),
        specificity: 0.5,
        corroborating: corroboration(&view.offline),
        supporting: view.offline.iter().map(|e| e.item.id).collect(),
        contradicting,
    })
}

fn action_failure(view: &TimelineView<'_>) -> Option<Candidate> {
    if view.failed_actions.len() < 2 {
        return None;
    }
    Some(Candidate {
        root_cause: RootCause::ActionFailure,
        rule: "action_failure",
        summary: format!("{} action attempts failed", view.failed_actions.len()),
        specificity: 0.4,
        corroborating: corroboration(&view.failed_actions),
        supporting: view.failed_actions.iter().map(|e| e.item.id).collect(),
        contradicting: Vec::new(),
    })
}

/// Timeline entries pre-classified for the rules.
struct TimelineView<'a> {
    entries: Vec<&'a TimelineEntry>,
    offline: Vec<&'a TimelineEntry>,
    failed_actions: Vec<&'a TimelineEntry>,
    catalog: &'a ToolCatalog,
}

impl<'a> TimelineView<'a> {
    fn new(timeline: &'a [TimelineEntry], catalog: &'a ToolCatalog) -> Self {
        let mut view = Self {
            entries: timeline.iter().collect(),
            offline: Vec::new(),
            failed_actions: Vec::new(),
            catalog,
        };
        for entry in timeline {
            if online_flag(&entry.item.payload) == Some(false) || is_offline_kind(&entry.item.kind) {
                view.offline.push(entry);
            }
            if view.is_action(entry) && is_failed_status(&entry.item.payload) {
                view.failed_actions.push(entry);
            }
        }
        view
    }

    fn is_action(&self, entry: &TimelineEntry) -> bool {
        self.catalog.role(&entry.item.source) == Some(ToolRole::ActionHistory)
            || entry.item.field("action_attempt_id").is_some()
    }
}

fn corroboration(supporting: &[&TimelineEntry]) -> usize {
    let merged: usize = supporting.iter().map(|e| e.corroborated_by.len()).sum();
    supporting.len().saturating_sub(1) + merged
}

fn is_online_signal(item: &EvidenceItem) -> bool {
    online_flag(&item.payload) == Some(true)
        || (is_connectivity_kind(&item.kind) && !is_offline_kind(&item.kind))
}

fn is_success(item: &EvidenceItem) -> bool {
    item.str_field("status")
        .is_some_and(|s| s.eq_ignore_ascii_case("success"))
}

fn server_error_provider(payload: &Value) -> Option<&str> {
    let status = ["status_code", "http_status"]
        .iter()
        .find_map(|f| payload.get(f).and_then(Value::as_u64))?;
    if status < 500 {
        return None;
    }
    payload.get("provider").and_then(Value::as_str)
}

fn upstream_provider(error: &ToolError) -> Option<&str> {
    if error.is_server_error() {
        error.provider.as_deref()
    } else {
        None
    }
}

/// Distinct finding descriptions, prefixed with the tool that produced them.
fn key_findings(evidence: &EvidenceStore) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for sourced in evidence.findings() {
        if matches!(sourced.finding, Finding::MoreDataAvailable { .. }) {
            continue;
        }
        let line = format!("{}: {}", sourced.tool, sourced.finding.describe());
        if !out.contains(&line) {
            out.push(line);
        }
    }
    out
}

/// Epoch second nearest to `ts`.
fn round_to_second(ts: DateTime<Utc>) -> i64 {
    (ts.timestamp_millis() + 500).div_euclid(1000)
}

/// Fraction of shared top-level fields with equal values.
///
/// Kind and timestamp fields are left out: the caller has already matched
/// those on their parsed values. Non-object payloads compare as a single field.
fn similarity(a: &Value, b: &Value) -> f64 {
    match (a.as_object(), b.as_object()) {
        (Some(a), Some(b)) => {
            let shared: Vec<&String> = a
                .keys()
                .filter(|k| b.contains_key(*k) && !is_identity_field(k))
                .collect();
            if shared.is_empty() {
                let bare = |m: &serde_json::Map<String, Value>| m.keys().all(|k| is_identity_field(k));
                return if bare(a) && bare(b) { 1.0 } else { 0.0 };
            }
            let equal = shared.iter().filter(|k| a.get(**k) == b.get(**k)).count();
            equal as f64 / shared.len() as f64
        }
        _ => f64::from(u8::from(a == b)),
    }
}

fn is_identity_field(key: &str) -> bool {
    KIND_FIELDS.contains(&key) || TIMESTAMP_FIELDS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tools::MockTool;
    use crate::domain::models::{
        CallOutcome, CanonicalArgs, SelectionReason, ToolInvocation, ToolSpec,
    };
    use crate::services::catalog::BuiltinTool;
    use crate::services::normalizer::EvidenceNormalizer;
    use serde_json::json;

    fn catalog() -> Arc<ToolCatalog> {
        let builder = BuiltinTool::ALL.iter().fold(ToolCatalog::builder(), |b, t| {
            b.register(t.spec(10), Arc::new(MockTool::returning(json!({}))))
        });
        let builder = builder.register(
            ToolSpec::new("get_code_history", ToolRole::Generic).with_priority(20),
            Arc::new(MockTool::returning(json!({}))),
        );
        Arc::new(builder.build().unwrap())
    }

    fn synthesizer() -> Synthesizer {
        Synthesizer::new(catalog(), SynthesisConfig::default())
    }

    fn add(store: &mut EvidenceStore, catalog: &ToolCatalog, tool: &str, payload: Value) {
        let spec = catalog.spec(tool).unwrap().clone();
        let normalized = EvidenceNormalizer.normalize(&spec, &payload);
        let invocation = ToolInvocation::new(
            tool,
            CanonicalArgs::new().with("n", store.records().len() as u64),
            0,
            SelectionReason::Initial,
        );
        let now = Utc::now();
        store.record_execution(invocation, CallOutcome::Success(payload), now, now, Some(normalized));
    }

    fn fail(store: &mut EvidenceStore, tool: &str, error: ToolError) {
        let invocation = ToolInvocation::new(
            tool,
            CanonicalArgs::new().with("n", store.records().len() as u64),
            0,
            SelectionReason::Initial,
        );
        let now = Utc::now();
        store.record_execution(invocation, CallOutcome::Failure(error), now, now, None);
    }

    #[test]
    fn test_offline_then_failed_actions_is_connectivity() {
        let catalog = catalog();
        let mut store = EvidenceStore::new();
        add(
            &mut store,
            &catalog,
            "get_device_info",
            json!({"device_id": "d1", "properties": {"online": false, "last_seen": "2024-07-21T10:00:00Z"}}),
        );
        add(
            &mut store,
            &catalog,
            "get_action_attempts",
            json!({"action_attempts": [
                {"action_attempt_id": "a2", "action_type": "UNLOCK_DOOR", "status": "error", "created_at": "2024-07-21T10:10:00Z"},
                {"action_attempt_id": "a1", "action_type": "UNLOCK_DOOR", "status": "error", "created_at": "2024-07-21T10:05:00Z"}
            ]}),
        );

        let synthesis = synthesizer().synthesize(&store);
        assert_eq!(synthesis.hypothesis.root_cause, RootCause::Connectivity);
        assert_eq!(synthesis.hypothesis.rule, "connectivity");
        assert!((synthesis.hypothesis.confidence - 0.7).abs() < 1e-9);
        assert_eq!(synthesis.hypothesis.supporting.len(), 3);

        let kinds: Vec<_> = synthesis.timeline.iter().map(|e| e.item.kind.as_str()).collect();
        assert_eq!(kinds, vec!["device_status", "UNLOCK_DOOR", "UNLOCK_DOOR"]);
        assert_eq!(synthesis.timeline[1].item.str_field("action_attempt_id"), Some("a1"));
    }

    #[test]
    fn test_successful_action_after_offline_lowers_confidence() {
        let catalog = catalog();
        let mut store = EvidenceStore::new();
        add(
            &mut store,
            &catalog,
            "get_device_info",
            json!({"properties": {"online": false, "last_seen": "2024-07-21T10:00:00Z"}}),
        );
        add(
            &mut store,
            &catalog,
            "get_action_attempts",
            json!({"action_attempts": [
                {"action_type": "UNLOCK_DOOR", "status": "error", "created_at": "2024-07-21T10:05:00Z"},
                {"action_type": "UNLOCK_DOOR", "status": "error", "created_at": "2024-07-21T10:06:00Z"},
                {"action_type": "LOCK_DOOR", "status": "success", "created_at": "2024-07-21T10:07:00Z"}
            ]}),
        );

        let hypothesis = synthesizer().synthesize(&store).hypothesis;
        assert_eq!(hypothesis.contradicting.len(), 1);
        assert!((hypothesis.confidence - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_events_merge_keeping_higher_priority_source() {
        let catalog = catalog();
        let mut store = EvidenceStore::new();
        add(
            &mut store,
            &catalog,
            "get_code_history",
            json!({"events": [{"event_type": "code_created", "occurred_at": "2024-07-21T10:00:00.300Z", "code": "1234", "note": "a"}]}),
        );
        add(
            &mut store,
            &catalog,
            "get_device_events",
            json!({"events": [{"event_type": "code_created", "occurred_at": "2024-07-21T10:00:00Z", "code": "1234", "note": "a", "device_id": "d1"}]}),
        );

        let timeline = synthesizer().synthesize(&store).timeline;
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].item.source, "get_device_events");
        assert_eq!(timeline[0].corroborated_by, vec!["get_code_history".to_string()]);
    }

    #[test]
    fn test_same_instant_in_different_notation_merges() {
        let catalog = catalog();
        let mut store = EvidenceStore::new();
        add(
            &mut store,
            &catalog,
            "get_code_history",
            json!({"events": [{"event_type": "code_created", "occurred_at": "2024-07-21T14:41:11.000+00:00", "access_code_id": "c1", "code": "1234", "note": "history"}]}),
        );
        add(
            &mut store,
            &catalog,
            "get_device_events",
            json!({"events": [{"event_type": "code_created", "occurred_at": "2024-07-21T14:41:11Z", "access_code_id": "c1", "code": "1234", "note": "device"}]}),
        );

        let timeline = synthesizer().synthesize(&store).timeline;
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].item.source, "get_device_events");
        assert_eq!(timeline[0].corroborated_by, vec!["get_code_history".to_string()]);
    }

    #[test]
    fn test_dissimilar_events_are_not_merged() {
        let catalog = catalog();
        let mut store = EvidenceStore::new();
        add(
            &mut store,
            &catalog,
            "get_device_events",
            json!({"events": [
                {"event_type": "code_created", "occurred_at": "2024-07-21T10:00:00Z", "code": "1111", "name": "front"},
                {"event_type": "code_created", "occurred_at": "2024-07-21T10:00:00Z", "code": "2222", "name": "back"}
            ]}),
        );
        assert_eq!(synthesizer().synthesize(&store).timeline.len(), 2);
    }

    #[test]
    fn test_untimestamped_items_sort_last_by_source() {
        let catalog = catalog();
        let mut store = EvidenceStore::new();
        add(&mut store, &catalog, "get_device_info", json!({"device_id": "d1"}));
        add(&mut store, &catalog, "get_admin_links", json!({"device_id": "d1", "admin_links": []}));
        add(
            &mut store,
            &catalog,
            "get_device_events",
            json!({"events": [{"event_type": "device.connected", "occurred_at": "2024-07-21T10:00:00Z"}]}),
        );

        let sources: Vec<_> = synthesizer()
            .synthesize(&store)
            .timeline
            .into_iter()
            .map(|e| e.item.source)
            .collect();
        assert_eq!(
            sources,
            vec!["get_device_events", "get_admin_links", "get_device_info"]
        );
    }

    #[test]
    fn test_repeated_upstream_errors_blame_provider() {
        let catalog = catalog();
        let mut store = EvidenceStore::new();
        for tool in ["get_device_info", "get_device_events"] {
            fail(
                &mut store,
                tool,
                ToolError::upstream("bad gateway")
                    .with_provider("august")
                    .with_status(502),
            );
        }
        fail(&mut store, "get_audit_logs", ToolError::not_found("none"));

        let hypothesis = synthesizer().synthesize(&store).hypothesis;
        assert_eq!(
            hypothesis.root_cause,
            RootCause::Provider {
                name: "august".into()
            }
        );
    }

    #[test]
    fn test_server_errors_from_one_call_do_not_blame_provider() {
        let catalog = catalog();
        let mut store = EvidenceStore::new();
        add(
            &mut store,
            &catalog,
            "get_device_events",
            json!({"events": [
                {"event_type": "lock.sync_failed", "occurred_at": "2024-07-21T10:00:00Z", "provider": "august", "status_code": 502},
                {"event_type": "lock.sync_failed", "occurred_at": "2024-07-21T10:05:00Z", "provider": "august", "status_code": 503}
            ]}),
        );

        let hypothesis = synthesizer().synthesize(&store).hypothesis;
        assert_eq!(hypothesis.root_cause, RootCause::Unknown);
    }

    #[test]
    fn test_server_errors_across_calls_blame_provider() {
        let catalog = catalog();
        let mut store = EvidenceStore::new();
        add(
            &mut store,
            &catalog,
            "get_device_events",
            json!({"events": [
                {"event_type": "lock.sync_failed", "occurred_at": "2024-07-21T10:00:00Z", "provider": "august", "status_code": 502}
            ]}),
        );
        fail(
            &mut store,
            "get_device_info",
            ToolError::upstream("bad gateway")
                .with_provider("august")
                .with_status(503),
        );

        let hypothesis = synthesizer().synthesize(&store).hypothesis;
        assert_eq!(
            hypothesis.root_cause,
            RootCause::Provider {
                name: "august".into()
            }
        );
        assert_eq!(hypothesis.supporting.len(), 1);
    }

    #[test]
    fn test_access_code_sync_rule() {
        let catalog = catalog();
        let mut store = EvidenceStore::new();
        add(
            &mut store,
            &catalog,
            "get_access_codes",
            json!({"access_codes": [{"access_code_id": "c1", "code": "1234", "is_managed": false}]}),
        );
        add(
            &mut store,
            &catalog,
            "get_action_attempts",
            json!({"action_attempts": [{"action_type": "CREATE_ACCESS_CODE", "status": "error", "created_at": "2024-07-21T10:00:00Z"}]}),
        );
        let synthesis = synthesizer().synthesize(&store);
        assert_eq!(synthesis.hypothesis.root_cause, RootCause::AccessCodeSync);
        assert!(synthesis
            .key_findings
            .contains(&"get_access_codes: 1 unmanaged access codes found".to_string()));
    }

    #[test]
    fn test_empty_evidence_is_unknown_with_zero_confidence() {
        let hypothesis = synthesizer().synthesize(&EvidenceStore::new()).hypothesis;
        assert_eq!(hypothesis.root_cause, RootCause::Unknown);
        assert_eq!(hypothesis.confidence, 0.0);
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity(&json!({"a": 1, "b": 2}), &json!({"a": 1, "b": 3})), 0.5);
        assert_eq!(similarity(&json!({"a": 1}), &json!({"c": 1})), 0.0);
        assert_eq!(similarity(&json!({}), &json!({})), 1.0);
        assert_eq!(
            similarity(
                &json!({"event_type": "x", "occurred_at": "2024-07-21T10:00:00Z", "a": 1}),
                &json!({"event_type": "x", "occurred_at": "2024-07-21T10:00:00.000+00:00", "a": 1})
            ),
            1.0
        );
        assert_eq!(
            similarity(
                &json!({"event_type": "x", "occurred_at": "2024-07-21T10:00:00Z"}),
                &json!({"event_type": "x", "time": 1_721_556_000})
            ),
            1.0
        );
    }
}
