//! Chooses which tools run in each round.
//!
//! Round 0 picks the category's tools in catalog order. Later rounds look
//! for gaps in the evidence and propose follow-ups, optionally asking the
//! reasoning engine for more. Nothing already cached is ever proposed again.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::models::{
    ArgSource, CacheKey, CanonicalArgs, EntityKind, EntityMap, Finding, Intent, RemainingBudget,
    SelectionConfig, SelectionReason, ToolInvocation, ToolRole, ToolSpec,
};
use crate::domain::ports::{EngineChoice, EngineContext, ProposedTool, ReasoningEngine};
use crate::services::catalog::ToolCatalog;
use crate::services::evidence_store::EvidenceStore;

/// Accumulates a round's selection, enforcing capacity and uniqueness.
struct Picker<'a> {
    evidence: &'a EvidenceStore,
    round: u32,
    capacity: usize,
    seen: HashSet<CacheKey>,
    picked: Vec<ToolInvocation>,
}

impl<'a> Picker<'a> {
    fn new(evidence: &'a EvidenceStore, round: u32, capacity: usize) -> Self {
        Self {
            evidence,
            round,
            capacity,
            seen: HashSet::new(),
            picked: Vec::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.picked.len() >= self.capacity
    }

    /// Adds the invocation unless it is cached, already picked, or over capacity.
    fn offer(&mut self, tool: &str, args: CanonicalArgs, reason: SelectionReason) -> bool {
        if self.is_full() {
            return false;
        }
        let invocation = ToolInvocation::new(tool, args, self.round, reason);
        let key = invocation.cache_key();
        if self.evidence.is_cached(&key) || !self.seen.insert(key) {
            return false;
        }
        self.picked.push(invocation);
        true
    }

    fn offer_all(&mut self, spec: &ToolSpec, pool: &EntityMap, reason: SelectionReason) {
        for args in bind(spec, pool) {
            self.offer(&spec.name, args, reason);
        }
    }
}

/// Binds a spec's arguments from an entity pool.
///
/// Returns no bindings when a required entity is missing. A required entity
/// with several values yields one binding per value; optional entities take
/// the first value.
pub fn bind(spec: &ToolSpec, pool: &EntityMap) -> Vec<CanonicalArgs> {
    let mut bindings = vec![CanonicalArgs::new()];
    for arg in &spec.args {
        match &arg.source {
            ArgSource::Literal(value) => {
                for binding in &mut bindings {
                    binding.insert(arg.name.clone(), value.clone());
                }
            }
            ArgSource::Entity(kind) => {
                let values: Vec<&String> = pool.get(kind).into_iter().flatten().collect();
                match (values.as_slice(), arg.required) {
                    ([], true) => return Vec::new(),
                    ([], false) => {}
                    ([first, ..], false) => {
                        for binding in &mut bindings {
                            binding.insert(arg.name.clone(), first.as_str());
                        }
                    }
                    (values, true) => {
                        let mut expanded = Vec::with_capacity(bindings.len() * values.len());
                        for binding in &bindings {
                            for value in values {
                                expanded.push(binding.clone().with(arg.name.clone(), value.as_str()));
                            }
                        }
                        bindings = expanded;
                    }
                }
            }
        }
    }
    bindings
}

/// Intent entities plus identifiers discovered in payloads.
pub fn entity_pool(intent: &Intent, evidence: &EvidenceStore) -> EntityMap {
    let mut pool = intent.entities.clone();
    for (kind, values) in evidence.discovered_entities() {
        pool.entry(*kind).or_default().extend(values.iter().cloned());
    }
    pool
}

/// Picks the invocations for each round.
pub struct ToolSelectionPolicy {
    catalog: Arc<ToolCatalog>,
    engine: Option<Arc<dyn ReasoningEngine>>,
    config: SelectionConfig,
}

impl ToolSelectionPolicy {
    /// Policy without engine assistance.
    pub fn new(catalog: Arc<ToolCatalog>, config: SelectionConfig) -> Self {
        Self {
            catalog,
            engine: None,
            config,
        }
    }

    /// Enables engine-assisted follow-ups in rounds after the first.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn ReasoningEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Invocations for the next round. Empty means nothing is left to learn.
    pub async fn select(
        &self,
        intent: &Intent,
        evidence: &EvidenceStore,
        round: u32,
        remaining: &RemainingBudget,
    ) -> Vec<ToolInvocation> {
        let capacity = remaining.round_capacity();
        if capacity == 0 {
            return Vec::new();
        }
        let mut picker = Picker::new(evidence, round, capacity);

        if round == 0 {
            for spec in self.catalog.for_category(intent.category) {
                picker.offer_all(spec, &intent.entities, SelectionReason::Initial);
            }
        } else {
            let pool = entity_pool(intent, evidence);
            self.follow_ups(intent, evidence, &pool, &mut picker);
            if !picker.is_full() {
                self.engine_proposals(intent, evidence, &pool, remaining, &mut picker)
                    .await;
            }
        }

        debug!(
            round,
            capacity,
            selected = picker.picked.len(),
            tools = ?picker.picked.iter().map(|i| i.tool.as_str()).collect::<Vec<_>>(),
            "tool selection complete"
        );
        picker.picked
    }

    fn role_has_run(&self, evidence: &EvidenceStore, role: ToolRole) -> bool {
        evidence
            .records()
            .iter()
            .any(|r| self.catalog.role(r.tool()) == Some(role))
    }

    fn offer_role(&self, picker: &mut Picker<'_>, role: ToolRole, pool: &EntityMap, reason: SelectionReason) {
        for spec in self.catalog.with_role(role) {
            picker.offer_all(spec, pool, reason);
        }
    }

    /// Gap rules, applied in a fixed order.
    fn follow_ups(
        &self,
        intent: &Intent,
        evidence: &EvidenceStore,
        pool: &EntityMap,
        picker: &mut Picker<'_>,
    ) {
        self.pagination(evidence, picker);

        if evidence.has_finding(|f| matches!(f, Finding::DeviceOffline { .. }))
            && !self.role_has_run(evidence, ToolRole::ConnectivityHistory)
        {
            self.offer_role(picker, ToolRole::ConnectivityHistory, pool, SelectionReason::DeviceOffline);
        }

        let lookup_failed = evidence
            .failures()
            .any(|r| self.catalog.role(r.tool()) == Some(ToolRole::DeviceStatus));
        if lookup_failed && !self.role_has_run(evidence, ToolRole::ThirdPartyLookup) {
            // Device lookups match third-party ids too, so an unresolved
            // device id is the best candidate when none was given.
            let mut lookup_pool = pool.clone();
            if !lookup_pool.contains_key(&EntityKind::ThirdPartyDeviceId) {
                if let Some(devices) = pool.get(&EntityKind::DeviceId) {
                    lookup_pool.insert(EntityKind::ThirdPartyDeviceId, devices.clone());
                }
            }
            self.offer_role(picker, ToolRole::ThirdPartyLookup, &lookup_pool, SelectionReason::DeviceLookupFailed);
        }

        if evidence.has_finding(|f| matches!(f, Finding::FailedActions { .. }))
            && !self.role_has_run(evidence, ToolRole::AuditTrail)
        {
            self.offer_role(picker, ToolRole::AuditTrail, pool, SelectionReason::FailedActions);
        }

        if evidence.has_finding(|f| matches!(f, Finding::AccessCodesFound { .. }))
            && !self.role_has_run(evidence, ToolRole::ConnectivityHistory)
        {
            self.offer_role(picker, ToolRole::ConnectivityHistory, pool, SelectionReason::AccessCodesFound);
        }

        for spec in self.catalog.for_category(intent.category) {
            if !evidence.has_run(&spec.name) {
                picker.offer_all(spec, pool, SelectionReason::Deferred);
            }
        }

        if !self.role_has_run(evidence, ToolRole::AdminLinks) {
            self.offer_role(picker, ToolRole::AdminLinks, pool, SelectionReason::AdminLinks);
        }
    }

    /// Re-run paginated tools with a larger `limit`.
    fn pagination(&self, evidence: &EvidenceStore, picker: &mut Picker<'_>) {
        for sourced in evidence.findings() {
            let Finding::MoreDataAvailable { suggested_limit } = sourced.finding else {
                continue;
            };
            let Some(record) = evidence.records().iter().find(|r| r.id == sourced.record_id) else {
                continue;
            };
            let Some(spec) = self.catalog.spec(record.tool()) else {
                continue;
            };
            if spec.arg("limit").is_none() {
                continue;
            }
            let current = record.invocation.args.get_u64("limit").unwrap_or(0);
            let next = suggested_limit
                .unwrap_or(self.config.followup_limit)
                .min(self.config.max_limit);
            if next <= current {
                continue;
            }
            let args = record.invocation.args.clone().with("limit", next);
            picker.offer(&spec.name, args, SelectionReason::Pagination);
        }
    }

    async fn engine_proposals(
        &self,
        intent: &Intent,
        evidence: &EvidenceStore,
        pool: &EntityMap,
        remaining: &RemainingBudget,
        picker: &mut Picker<'_>,
    ) {
        let Some(engine) = self.engine.as_ref().filter(|_| self.config.engine_assist) else {
            return;
        };
        let context = EngineContext::ProposeTools {
            intent: intent.clone(),
            round: picker.round,
            findings: evidence.findings().iter().map(|f| f.finding.describe()).collect(),
            tools_run: evidence.tools_run().into_iter().map(str::to_string).collect(),
            candidates: self.catalog.specs().cloned().collect(),
        };
        let wait = self.config.engine_timeout().min(remaining.time_left);

        let proposals = match tokio::time::timeout(wait, engine.propose(&context)).await {
            Ok(Ok(EngineChoice::Tools { tools })) => tools,
            Ok(Ok(EngineChoice::Intent(_))) => {
                warn!(engine = engine.name(), "engine answered a tool request with an intent");
                return;
            }
            Ok(Err(e)) => {
                warn!(engine = engine.name(), error = %e, "engine tool proposal failed");
                return;
            }
            Err(_) => {
                warn!(engine = engine.name(), "engine tool proposal timed out");
                return;
            }
        };

        for proposal in proposals {
            match self.bind_proposal(&proposal, pool) {
                Some(args) => {
                    picker.offer(&proposal.name, args, SelectionReason::EngineProposal);
                }
                None => debug!(tool = %proposal.name, "dropping unusable engine proposal"),
            }
        }
    }

    /// Validates an engine proposal against the catalog.
    ///
    /// Unknown tools, undeclared arguments and missing required arguments
    /// make the proposal unusable.
    fn bind_proposal(&self, proposal: &ProposedTool, pool: &EntityMap) -> Option<CanonicalArgs> {
        let spec = self.catalog.spec(&proposal.name)?;
        if proposal.args.keys().any(|k| spec.arg(k).is_none()) {
            return None;
        }
        let mut args = bind(spec, pool).into_iter().next().unwrap_or_default();
        for (name, value) in &proposal.args {
            if !matches!(value, Value::Null) {
                args.insert(name.clone(), value.clone());
            }
        }
        spec.args
            .iter()
            .filter(|a| a.required)
            .all(|a| args.contains(&a.name))
            .then_some(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::engines::StubReasoningEngine;
    use crate::adapters::tools::MockTool;
    use crate::domain::errors::ToolError;
    use crate::domain::models::{ArgSpec, Budget, CallOutcome, DeadlineClock, IssueCategory};
    use crate::services::catalog::BuiltinTool;
    use crate::services::normalizer::EvidenceNormalizer;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    const DEVICE: &str = "49aa8687-041e-471e-9188-8b0b13d930b3";

    fn builtin_catalog() -> Arc<ToolCatalog> {
        let builder = BuiltinTool::ALL.iter().fold(ToolCatalog::builder(), |b, t| {
            b.register(t.spec(10), Arc::new(MockTool::returning(json!({}))))
        });
        Arc::new(builder.build().unwrap())
    }

    fn remaining(budget: &Budget) -> RemainingBudget {
        RemainingBudget::compute(budget, 0, 0, &DeadlineClock::start(Duration::from_secs(60)))
    }

    fn record(store: &mut EvidenceStore, catalog: &ToolCatalog, invocation: ToolInvocation, outcome: CallOutcome) {
        let spec = catalog.spec(&invocation.tool).unwrap().clone();
        let normalized = outcome.payload().map(|p| EvidenceNormalizer.normalize(&spec, p));
        let now = Utc::now();
        store.record_execution(invocation, outcome, now, now, normalized);
    }

    fn troubleshooting_intent() -> Intent {
        Intent::unknown()
            .with_category(IssueCategory::Troubleshooting)
            .with_entity(EntityKind::DeviceId, DEVICE)
            .with_confidence(0.9)
    }

    #[tokio::test]
    async fn test_round_zero_skips_unbindable_tools() {
        let policy = ToolSelectionPolicy::new(builtin_catalog(), SelectionConfig::default());
        let store = EvidenceStore::new();
        let picked = policy
            .select(&troubleshooting_intent(), &store, 0, &remaining(&Budget::standard()))
            .await;

        let names: Vec<_> = picked.iter().map(|i| i.tool.as_str()).collect();
        // Workspace-scoped tools wait for a workspace id.
        assert_eq!(names, vec!["get_device_info", "get_audit_logs"]);
        assert!(picked.iter().all(|i| i.reason == SelectionReason::Initial));
        assert_eq!(picked[1].args.get_u64("limit"), Some(10));
    }

    #[tokio::test]
    async fn test_round_zero_respects_capacity_and_fans_out_values() {
        let policy = ToolSelectionPolicy::new(builtin_catalog(), SelectionConfig::default());
        let intent = troubleshooting_intent()
            .with_entity(EntityKind::DeviceId, "11111111-1111-1111-1111-111111111111")
            .with_entity(EntityKind::WorkspaceId, "w1");
        let budget = Budget::standard().with_max_tools_per_round(3);
        let picked = policy
            .select(&intent, &EvidenceStore::new(), 0, &remaining(&budget))
            .await;

        assert_eq!(picked.len(), 3);
        assert_eq!(picked[0].tool, "get_device_info");
        assert_eq!(picked[1].tool, "get_device_info");
        assert_ne!(picked[0].args, picked[1].args);
        assert_eq!(picked[2].tool, "get_action_attempts");
    }

    #[tokio::test]
    async fn test_follow_ups_use_discovered_entities_and_gap_rules() {
        let catalog = builtin_catalog();
        let policy = ToolSelectionPolicy::new(Arc::clone(&catalog), SelectionConfig::default());
        let intent = troubleshooting_intent();
        let mut store = EvidenceStore::new();
        let device_args = CanonicalArgs::new().with("device_id", DEVICE);
        record(
            &mut store,
            &catalog,
            ToolInvocation::new("get_device_info", device_args, 0, SelectionReason::Initial),
            CallOutcome::Success(json!({
                "device_id": DEVICE,
                "workspace_id": "w1",
                "properties": {"online": false}
            })),
        );

        let budget = Budget::debug();
        let picked = policy.select(&intent, &store, 1, &remaining(&budget)).await;
        let reasons: Vec<_> = picked.iter().map(|i| (i.tool.as_str(), i.reason)).collect();

        assert_eq!(
            reasons,
            vec![
                ("get_device_events", SelectionReason::DeviceOffline),
                ("get_action_attempts", SelectionReason::Deferred),
                ("get_access_codes", SelectionReason::Deferred),
                ("get_audit_logs", SelectionReason::Deferred),
                ("get_admin_links", SelectionReason::AdminLinks),
            ]
        );
        assert_eq!(picked[0].args.get_str("workspace_id"), Some("w1"));
    }

    #[tokio::test]
    async fn test_failed_device_lookup_tries_third_party() {
        let catalog = builtin_catalog();
        let policy = ToolSelectionPolicy::new(Arc::clone(&catalog), SelectionConfig::default());
        let mut store = EvidenceStore::new();
        record(
            &mut store,
            &catalog,
            ToolInvocation::new(
                "get_device_info",
                CanonicalArgs::new().with("device_id", DEVICE),
                0,
                SelectionReason::Initial,
            ),
            CallOutcome::Failure(ToolError::not_found("no device")),
        );

        let picked = policy
            .select(&troubleshooting_intent(), &store, 1, &remaining(&Budget::debug()))
            .await;
        assert_eq!(picked[0].tool, "get_third_party_device_info");
        assert_eq!(picked[0].args.get_str("third_party_device_id"), Some(DEVICE));
    }

    #[tokio::test]
    async fn test_pagination_raises_limit_once() {
        let catalog = builtin_catalog();
        let policy = ToolSelectionPolicy::new(Arc::clone(&catalog), SelectionConfig::default());
        let mut store = EvidenceStore::new();
        let args = CanonicalArgs::new().with("device_id", DEVICE).with("limit", 10);
        record(
            &mut store,
            &catalog,
            ToolInvocation::new("get_audit_logs", args.clone(), 0, SelectionReason::Initial),
            CallOutcome::Success(json!({"audit_logs": [], "pagination": {"has_more": true}})),
        );

        let picked = policy
            .select(&troubleshooting_intent(), &store, 1, &remaining(&Budget::debug()))
            .await;
        assert_eq!(picked[0].tool, "get_audit_logs");
        assert_eq!(picked[0].reason, SelectionReason::Pagination);
        assert_eq!(picked[0].args.get_u64("limit"), Some(50));

        // The larger page still reports more: the follow-up limit is spent.
        record(
            &mut store,
            &catalog,
            ToolInvocation::new("get_audit_logs", args.with("limit", 50), 1, SelectionReason::Pagination),
            CallOutcome::Success(json!({"audit_logs": [], "pagination": {"has_more": true}})),
        );
        let picked = policy
            .select(&troubleshooting_intent(), &store, 2, &remaining(&Budget::debug()))
            .await;
        assert!(picked.iter().all(|i| i.reason != SelectionReason::Pagination));
    }

    #[tokio::test]
    async fn test_engine_proposals_are_validated() {
        let catalog = Arc::new(
            ToolCatalog::builder()
                .register(
                    ToolSpec::new("lookup", ToolRole::Generic)
                        .with_arg(ArgSpec::entity(EntityKind::DeviceId)),
                    Arc::new(MockTool::returning(json!({}))),
                )
                .build()
                .unwrap(),
        );
        let mut extra = serde_json::Map::new();
        extra.insert("bogus".into(), json!(1));
        let engine = StubReasoningEngine::new().with_proposals(vec![
            ProposedTool::named("not_in_catalog"),
            ProposedTool {
                name: "lookup".into(),
                args: extra,
            },
            ProposedTool::named("lookup"),
        ]);
        let config = SelectionConfig {
            engine_assist: true,
            ..Default::default()
        };
        let policy = ToolSelectionPolicy::new(catalog, config).with_engine(Arc::new(engine));

        let picked = policy
            .select(&troubleshooting_intent(), &EvidenceStore::new(), 1, &remaining(&Budget::standard()))
            .await;
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].reason, SelectionReason::EngineProposal);
        assert_eq!(picked[0].args.get_str("device_id"), Some(DEVICE));
    }

    #[tokio::test]
    async fn test_engine_failure_is_ignored() {
        let engine = StubReasoningEngine::failing(crate::domain::errors::EngineError::Timeout);
        let config = SelectionConfig {
            engine_assist: true,
            ..Default::default()
        };
        let policy = ToolSelectionPolicy::new(builtin_catalog(), config).with_engine(Arc::new(engine));
        let picked = policy
            .select(&troubleshooting_intent(), &EvidenceStore::new(), 1, &remaining(&Budget::standard()))
            .await;
        assert!(!picked.is_empty());
        assert!(picked.iter().all(|i| i.reason != SelectionReason::EngineProposal));
    }

    #[tokio::test]
    async fn test_zero_capacity_selects_nothing() {
        let policy = ToolSelectionPolicy::new(builtin_catalog(), SelectionConfig::default());
        let budget = Budget::standard().with_max_total_tool_calls(0);
        let picked = policy
            .select(&troubleshooting_intent(), &EvidenceStore::new(), 0, &remaining(&budget))
            .await;
        assert!(picked.is_empty());
    }
}
