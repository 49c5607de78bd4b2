//! Append-only store of call records, evidence items and the call cache.
//!
//! Owned by exactly one investigation and mutated only by the scheduler
//! between rounds.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

use crate::domain::models::{
    CacheKey, CacheStatus, CallOutcome, EntityKind, EntityMap, EvidenceItem, Finding,
    SourcedFinding, ToolCallRecord, ToolInvocation,
};
use crate::services::normalizer::Normalized;

/// Everything one investigation has learned so far.
#[derive(Debug, Default)]
pub struct EvidenceStore {
    records: Vec<ToolCallRecord>,
    items: Vec<EvidenceItem>,
    findings: Vec<SourcedFinding>,
    /// Cache key to the index of the executed record.
    cache: HashMap<CacheKey, usize>,
    discovered: EntityMap,
    executed_calls: usize,
    cache_hits: usize,
}

impl EvidenceStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a freshly executed call and the evidence derived from it.
    pub fn record_execution(
        &mut self,
        invocation: ToolInvocation,
        outcome: CallOutcome,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        normalized: Option<Normalized>,
    ) -> &ToolCallRecord {
        let record_id = self.next_record_id();
        let key = invocation.cache_key();
        let tool = invocation.tool.clone();
        let round = invocation.round;

        if let (CallOutcome::Success(_), Some(normalized)) = (&outcome, normalized) {
            for item in normalized.items {
                let id = self.items.len() as u64 + 1;
                self.items.push(EvidenceItem {
                    id,
                    record_id,
                    source: tool.clone(),
                    round,
                    kind: item.kind,
                    timestamp: item.timestamp,
                    payload: item.payload,
                });
            }
            for (kind, value) in normalized.entities {
                self.discovered.entry(kind).or_default().insert(value);
            }
            self.findings
                .extend(normalized.findings.into_iter().map(|finding| SourcedFinding {
                    tool: tool.clone(),
                    record_id,
                    finding,
                }));
        }

        self.executed_calls += 1;
        self.cache.insert(key, self.records.len());
        self.push_record(ToolCallRecord {
            id: record_id,
            invocation,
            outcome,
            started_at,
            finished_at,
            cache: CacheStatus::Miss,
        })
    }

    /// Append a record served from the cache. No new evidence is created.
    ///
    /// Returns `None` when the invocation was never executed.
    pub fn record_cache_hit(
        &mut self,
        invocation: ToolInvocation,
        at: DateTime<Utc>,
    ) -> Option<&ToolCallRecord> {
        let index = *self.cache.get(&invocation.cache_key())?;
        let outcome = self.records[index].outcome.clone();
        let id = self.next_record_id();
        self.cache_hits += 1;
        Some(self.push_record(ToolCallRecord {
            id,
            invocation,
            outcome,
            started_at: at,
            finished_at: at,
            cache: CacheStatus::Hit,
        }))
    }

    fn push_record(&mut self, record: ToolCallRecord) -> &ToolCallRecord {
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    fn next_record_id(&self) -> u64 {
        self.records.len() as u64 + 1
    }

    /// Whether an executed call with this key exists.
    pub fn is_cached(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key)
    }

    /// The executed record for a cache key.
    pub fn lookup(&self, key: &CacheKey) -> Option<&ToolCallRecord> {
        self.cache.get(key).map(|&i| &self.records[i])
    }

    /// Every record, in completion order.
    pub fn records(&self) -> &[ToolCallRecord] {
        &self.records
    }

    /// Every evidence item, in arrival order.
    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    /// Every finding, in arrival order.
    pub fn findings(&self) -> &[SourcedFinding] {
        &self.findings
    }

    /// Whether any finding satisfies `pred`.
    pub fn has_finding(&self, pred: impl Fn(&Finding) -> bool) -> bool {
        self.findings.iter().any(|f| pred(&f.finding))
    }

    /// Entities discovered in tool payloads.
    pub const fn discovered_entities(&self) -> &EntityMap {
        &self.discovered
    }

    /// Discovered values of `kind`.
    pub fn discovered(&self, kind: EntityKind) -> Option<&BTreeSet<String>> {
        self.discovered.get(&kind)
    }

    /// Calls actually dispatched to a tool (cache misses).
    pub const fn executed_calls(&self) -> usize {
        self.executed_calls
    }

    /// Invocations answered from the cache.
    pub const fn cache_hits(&self) -> usize {
        self.cache_hits
    }

    /// Executed records that failed, in append order.
    pub fn failures(&self) -> impl Iterator<Item = &ToolCallRecord> {
        self.records
            .iter()
            .filter(|r| r.cache == CacheStatus::Miss && !r.is_success())
    }

    /// Names of tools that have been executed at least once.
    pub fn tools_run(&self) -> BTreeSet<&str> {
        self.records.iter().map(ToolCallRecord::tool).collect()
    }

    /// Whether `tool` has been called at least once.
    pub fn has_run(&self, tool: &str) -> bool {
        self.records.iter().any(|r| r.tool() == tool)
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ToolError;
    use crate::domain::models::{CanonicalArgs, SelectionReason};
    use crate::services::normalizer::NormalizedItem;
    use serde_json::json;

    fn invocation(tool: &str, round: u32) -> ToolInvocation {
        ToolInvocation::new(
            tool,
            CanonicalArgs::new().with("device_id", "d1"),
            round,
            SelectionReason::Initial,
        )
    }

    fn normalized_one(kind: &str) -> Normalized {
        Normalized {
            items: vec![NormalizedItem {
                kind: kind.to_string(),
                timestamp: None,
                payload: json!({"kind": kind}),
            }],
            entities: vec![(EntityKind::WorkspaceId, "w1".to_string())],
            findings: vec![Finding::DeviceOnline],
        }
    }

    #[test]
    fn test_execution_creates_traceable_evidence() {
        let mut store = EvidenceStore::new();
        let now = Utc::now();
        let record_id = store
            .record_execution(
                invocation("get_device_info", 0),
                CallOutcome::Success(json!({})),
                now,
                now,
                Some(normalized_one("device_status")),
            )
            .id;

        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].record_id, record_id);
        assert_eq!(store.items()[0].source, "get_device_info");
        assert!(store.discovered(EntityKind::WorkspaceId).is_some());
        assert!(store.has_finding(|f| matches!(f, Finding::DeviceOnline)));
        assert_eq!(store.executed_calls(), 1);
    }

    #[test]
    fn test_failures_never_create_evidence() {
        let mut store = EvidenceStore::new();
        let now = Utc::now();
        store.record_execution(
            invocation("get_device_info", 0),
            CallOutcome::Failure(ToolError::not_found("no such device")),
            now,
            now,
            Some(normalized_one("device_status")),
        );

        assert!(store.items().is_empty());
        assert_eq!(store.failures().count(), 1);
        assert!(store.is_cached(&invocation("get_device_info", 3).cache_key()));
    }

    #[test]
    fn test_cache_hit_reuses_outcome_without_new_evidence() {
        let mut store = EvidenceStore::new();
        let now = Utc::now();
        store.record_execution(
            invocation("get_device_info", 0),
            CallOutcome::Success(json!({"online": true})),
            now,
            now,
            Some(normalized_one("device_status")),
        );

        let hit = store
            .record_cache_hit(invocation("get_device_info", 1), now)
            .cloned()
            .unwrap();
        assert!(hit.is_cache_hit());
        assert_eq!(hit.outcome, CallOutcome::Success(json!({"online": true})));
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.executed_calls(), 1);
        assert_eq!(store.cache_hits(), 1);
        assert_eq!(store.failures().count(), 0);
    }

    #[test]
    fn test_cache_hit_without_execution_is_rejected() {
        let mut store = EvidenceStore::new();
        assert!(store
            .record_cache_hit(invocation("get_audit_logs", 0), Utc::now())
            .is_none());
        assert!(store.records().is_empty());
    }
}
