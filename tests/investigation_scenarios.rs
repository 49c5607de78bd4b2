//! End-to-end investigation scenarios against mock tools and a scripted engine.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{builtin_with, catalog_of, engine_for, investigator_with};
use investigator::adapters::engines::StubReasoningEngine;
use investigator::adapters::tools::MockTool;
use investigator::domain::errors::{BudgetError, InitError};
use investigator::domain::models::{
    ArgSpec, EntityKind, IncompleteReason, StopReason, ToolRole,
};
use investigator::services::{BuiltinTool, ToolCatalog};
use investigator::{
    Budget, InvestigationError, Investigator, InvestigatorSettings, IssueCategory, ResultFlag, RootCause,
    SchedulerState, ToolErrorKind, ToolSpec,
};
use serde_json::json;

#[tokio::test]
async fn test_offline_device_with_failed_unlocks_is_connectivity() {
    let catalog = builtin_with(vec![
        (
            BuiltinTool::DeviceInfo,
            MockTool::returning(json!({
                "device_id": "d1",
                "properties": {"online": false, "last_seen": "2024-07-21T10:00:00Z"}
            })),
        ),
        (
            BuiltinTool::ActionAttempts,
            MockTool::returning(json!({"action_attempts": [
                {"action_attempt_id": "a2", "action_type": "UNLOCK_DOOR", "status": "error", "created_at": "2024-07-21T10:12:00Z"},
                {"action_attempt_id": "a1", "action_type": "UNLOCK_DOOR", "status": "error", "created_at": "2024-07-21T10:05:00Z"}
            ]})),
        ),
    ]);
    let investigator = investigator_with(catalog, engine_for("device_behavior"));

    let result = investigator
        .investigate("Why won't the front door unlock?", &Budget::standard())
        .await
        .unwrap();

    assert_eq!(result.intent.category, IssueCategory::DeviceBehavior);
    assert_eq!(result.hypothesis.root_cause, RootCause::Connectivity);
    assert!(result.confidence >= 0.6, "confidence {}", result.confidence);
    assert_eq!(result.timeline.len(), 3);

    let times: Vec<_> = result
        .timeline
        .iter()
        .map(|e| e.item.timestamp.unwrap().to_rfc3339())
        .collect();
    assert_eq!(
        times,
        vec![
            "2024-07-21T10:00:00+00:00",
            "2024-07-21T10:05:00+00:00",
            "2024-07-21T10:12:00+00:00"
        ]
    );
    assert!(!result.incomplete);
    assert_eq!(result.final_state, SchedulerState::Done);
    assert!(result
        .key_findings
        .iter()
        .any(|f| f.starts_with("get_action_attempts:")));
}

#[tokio::test]
async fn test_same_second_events_from_two_tools_merge() {
    let code_history = ToolSpec::new("get_code_history", ToolRole::Generic)
        .for_categories(&[IssueCategory::Troubleshooting])
        .with_priority(20);
    let device_events = BuiltinTool::DeviceEvents.spec(10);
    let catalog = catalog_of(vec![
        (
            code_history,
            MockTool::returning(json!({"events": [
                {"event_type": "code_created", "occurred_at": "2024-07-21T10:00:00.300Z", "code": "1234", "note": "created"}
            ]})),
        ),
        (
            device_events,
            MockTool::returning(json!({"events": [
                {"event_type": "code_created", "occurred_at": "2024-07-21T10:00:00Z", "code": "1234", "note": "created", "device_id": "d1"}
            ]})),
        ),
    ]);
    let investigator = investigator_with(catalog, engine_for("troubleshooting"));

    let result = investigator
        .investigate("Access code 1234 never showed up", &Budget::standard())
        .await
        .unwrap();

    assert_eq!(result.tool_calls_executed, 2);
    assert_eq!(result.timeline.len(), 1);
    let entry = &result.timeline[0];
    assert_eq!(entry.item.kind, "code_created");
    assert_eq!(entry.item.source, "get_device_events");
    assert_eq!(entry.corroborated_by, vec!["get_code_history".to_string()]);
}

#[tokio::test]
async fn test_slow_tool_times_out_and_investigation_continues() {
    let catalog = builtin_with(vec![
        (
            BuiltinTool::DeviceInfo,
            MockTool::returning(json!({"device_id": "d1"})).with_delay(Duration::from_secs(5)),
        ),
        (
            BuiltinTool::ActionAttempts,
            MockTool::returning(json!({"action_attempts": [
                {"action_type": "LOCK_DOOR", "status": "success", "created_at": "2024-07-21T09:00:00Z"}
            ]})),
        ),
    ]);
    let investigator = investigator_with(catalog, engine_for("troubleshooting"));
    let budget = Budget::standard().with_call_timeout(Duration::from_millis(100));

    let result = investigator
        .investigate("lock is acting up", &budget)
        .await
        .unwrap();

    let timeouts: Vec<_> = result.errors_of("get_device_info").collect();
    assert_eq!(timeouts.len(), 1);
    assert_eq!(timeouts[0].error.kind, ToolErrorKind::Timeout);
    assert!(result.has_flag(ResultFlag::ToolErrors));
    assert_eq!(result.timeline.len(), 1);
    assert_eq!(result.timeline[0].item.source, "get_action_attempts");
    assert_eq!(result.final_state, SchedulerState::Done);
}

#[tokio::test]
async fn test_empty_selection_after_second_round_finishes() {
    let connection_log = ToolSpec::new("get_connection_log", ToolRole::ConnectivityHistory)
        .with_arg(ArgSpec::entity(EntityKind::DeviceId))
        .with_priority(50);
    let log = MockTool::returning(json!({"events": [
        {"event_type": "device.disconnected", "occurred_at": "2024-07-21T10:00:00Z"}
    ]}));
    let log_calls = log.call_counter();
    let catalog = catalog_of(vec![
        (
            BuiltinTool::DeviceInfo.spec(10),
            MockTool::returning(json!({"device_id": "d1", "properties": {"online": false}})),
        ),
        (connection_log, log),
    ]);
    let investigator = investigator_with(catalog, engine_for("troubleshooting"));

    let result = investigator
        .investigate("device keeps dropping", &Budget::standard())
        .await
        .unwrap();

    assert_eq!(result.rounds_completed, 2);
    assert_eq!(result.stop_reason, Some(StopReason::NoCandidates));
    assert_eq!(result.final_state, SchedulerState::Done);
    assert_eq!(log_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(result.records[1].tool(), "get_connection_log");
    assert_eq!(result.records[1].round(), 1);
    assert!(!result.incomplete);
}

#[tokio::test]
async fn test_zero_rounds_returns_empty_incomplete_result() {
    let tool = MockTool::returning(json!({"device_id": "d1"}));
    let calls = tool.call_counter();
    let catalog = builtin_with(vec![(BuiltinTool::DeviceInfo, tool)]);
    let investigator = investigator_with(catalog, engine_for("troubleshooting"));

    let result = investigator
        .investigate("anything", &Budget::standard().with_max_rounds(0))
        .await
        .unwrap();

    assert!(result.timeline.is_empty());
    assert!(result.incomplete);
    assert!(result.has_flag(ResultFlag::Incomplete(IncompleteReason::BudgetExhausted)));
    assert_eq!(result.final_state, SchedulerState::Aborted);
    assert_eq!(result.tool_calls_executed, 0);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_budget_is_fatal_before_any_work() {
    let engine = Arc::new(engine_for("troubleshooting"));
    let catalog = builtin_with(vec![(BuiltinTool::DeviceInfo, MockTool::returning(json!({})))]);
    let investigator = Investigator::new(
        Arc::new(catalog),
        engine.clone(),
        InvestigatorSettings::default(),
    );

    let err = investigator
        .investigate("anything", &Budget::standard().with_max_tools_per_round(0))
        .await
        .unwrap_err();

    assert!(err.is_fatal_init());
    assert!(matches!(
        err,
        InvestigationError::FatalInit(InitError::Budget(BudgetError::ZeroToolsPerRound))
    ));
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn test_empty_catalog_is_fatal() {
    let catalog = ToolCatalog::builder().build().unwrap();
    let investigator = investigator_with(catalog, StubReasoningEngine::new());

    let err = investigator
        .investigate("anything", &Budget::standard())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InvestigationError::FatalInit(InitError::EmptyCatalog)
    ));
}

#[tokio::test]
async fn test_no_invocation_executes_twice_across_rounds() {
    let catalog = builtin_with(vec![
        (
            BuiltinTool::DeviceInfo,
            MockTool::returning(json!({"device_id": "d1", "workspace_id": "w1", "properties": {"online": false}})),
        ),
        (
            BuiltinTool::ActionAttempts,
            MockTool::returning(json!({
                "action_attempts": [{"action_type": "UNLOCK_DOOR", "status": "error", "created_at": "2024-07-21T10:05:00Z"}],
                "pagination": {"has_more": true}
            })),
        ),
        (BuiltinTool::DeviceEvents, MockTool::returning(json!({"events": []}))),
        (BuiltinTool::AuditLogs, MockTool::returning(json!({"audit_logs": []}))),
        (BuiltinTool::AdminLinks, MockTool::returning(json!({"admin_links": []}))),
    ]);
    let investigator = investigator_with(catalog, engine_for("device_behavior"));
    let budget = Budget::debug();

    let result = investigator
        .investigate("lock offline and unlocks failing", &budget)
        .await
        .unwrap();

    let mut seen = HashSet::new();
    for record in result.records.iter().filter(|r| !r.is_cache_hit()) {
        assert!(
            seen.insert(record.invocation.cache_key()),
            "{} executed twice",
            record.tool()
        );
    }
    assert!(result.tool_calls_executed <= budget.max_total_tool_calls);
    assert!(result.rounds_completed <= budget.max_rounds);
    // Pagination follow-up re-ran action attempts with a larger limit.
    assert!(result
        .records
        .iter()
        .any(|r| r.tool() == "get_action_attempts" && r.invocation.args.get_u64("limit") > Some(10)));
}

#[test]
fn test_blocking_wrapper_runs_without_runtime() {
    let catalog = builtin_with(vec![(
        BuiltinTool::DeviceInfo,
        MockTool::returning(json!({"device_id": "d1", "properties": {"online": true}})),
    )]);
    let investigator = investigator_with(catalog, engine_for("troubleshooting"));

    let result = investigator
        .investigate_blocking("is it online?", &Budget::production())
        .unwrap();
    assert_eq!(result.tool_calls_executed, 1);
    assert_eq!(result.hypothesis.root_cause, RootCause::Unknown);
}
