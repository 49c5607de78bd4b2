//! Investigation entry point.
//!
//! Wires the parser, scheduler and synthesizer together for a single query.
//! Only configuration errors are returned as `Err`; everything else ends up
//! in the result as flags or error entries.

use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::domain::errors::{DomainResult, InvestigationError};
use crate::domain::models::{
    Budget, DeadlineClock, ErrorEntry, InvestigationQuery, InvestigationResult, ParserConfig,
    ResultFlag, SelectionConfig, SynthesisConfig,
};
use crate::domain::ports::ReasoningEngine;
use crate::services::catalog::ToolCatalog;
use crate::services::intent_parser::QueryIntentParser;
use crate::services::scheduler::{ExecutionScheduler, SchedulerOutcome};
use crate::services::selection_policy::ToolSelectionPolicy;
use crate::services::synthesizer::Synthesizer;

/// Tunables shared by every investigation run by one [`Investigator`].
#[derive(Debug, Clone, Default)]
pub struct InvestigatorSettings {
    /// Query parsing settings.
    pub parser: ParserConfig,
    /// Tool selection settings.
    pub selection: SelectionConfig,
    /// Synthesis settings.
    pub synthesis: SynthesisConfig,
}

impl From<&crate::domain::models::Config> for InvestigatorSettings {
    fn from(config: &crate::domain::models::Config) -> Self {
        Self {
            parser: config.parser.clone(),
            selection: config.selection.clone(),
            synthesis: config.synthesis.clone(),
        }
    }
}

/// Runs investigations against a shared catalog and engine.
pub struct Investigator {
    parser: QueryIntentParser,
    scheduler: ExecutionScheduler,
    synthesizer: Synthesizer,
}

impl Investigator {
    /// Builds the parser, scheduler and synthesizer over a shared catalog and engine.
    pub fn new(
        catalog: Arc<ToolCatalog>,
        engine: Arc<dyn ReasoningEngine>,
        settings: InvestigatorSettings,
    ) -> Self {
        let policy = ToolSelectionPolicy::new(Arc::clone(&catalog), settings.selection)
            .with_engine(Arc::clone(&engine));
        Self {
            parser: QueryIntentParser::new(engine, settings.parser),
            scheduler: ExecutionScheduler::new(Arc::clone(&catalog), policy),
            synthesizer: Synthesizer::new(catalog, settings.synthesis),
        }
    }

    /// Investigate a free-text support query within `budget`.
    pub async fn investigate(
        &self,
        query_text: &str,
        budget: &Budget,
    ) -> DomainResult<InvestigationResult> {
        budget.validate()?;
        let query = InvestigationQuery::new(query_text);
        let span = info_span!(
            "investigation",
            id = %query.id,
            query_len = query.text.len()
        );
        self.run(query, budget).instrument(span).await
    }

    /// Blocking wrapper for callers without a runtime.
    ///
    /// # Errors
    /// Returns [`InvestigationError::Runtime`] when called from inside a
    /// tokio runtime, where blocking would panic.
    pub fn investigate_blocking(
        &self,
        query_text: &str,
        budget: &Budget,
    ) -> DomainResult<InvestigationResult> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(InvestigationError::Runtime(
                "investigate_blocking called from within an async runtime".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| InvestigationError::Runtime(e.to_string()))?;
        runtime.block_on(self.investigate(query_text, budget))
    }

    async fn run(
        &self,
        query: InvestigationQuery,
        budget: &Budget,
    ) -> DomainResult<InvestigationResult> {
        let clock = DeadlineClock::start(budget.deadline);

        let intent = self.parser.parse(&query, clock.remaining()).await;
        info!(
            category = %intent.category,
            confidence = intent.confidence,
            ambiguous = intent.ambiguous,
            "query parsed"
        );

        let SchedulerOutcome {
            evidence,
            final_state,
            stop_reason,
            rounds_completed,
            state_trace,
        } = self.scheduler.run(&intent, budget, &clock).await?;

        let synthesis = self.synthesizer.synthesize(&evidence);

        let errors: Vec<ErrorEntry> = evidence
            .failures()
            .filter_map(|record| {
                record.outcome.error().map(|error| ErrorEntry {
                    record_id: record.id,
                    tool: record.tool().to_string(),
                    round: record.round(),
                    error: error.clone(),
                })
            })
            .collect();

        let mut flags = Vec::new();
        if let Some(reason) = stop_reason.incomplete_reason() {
            flags.push(ResultFlag::Incomplete(reason));
        }
        if intent.ambiguous {
            flags.push(ResultFlag::ParseAmbiguity);
        }
        if !errors.is_empty() {
            flags.push(ResultFlag::ToolErrors);
        }

        let result = InvestigationResult {
            investigation_id: query.id,
            query: query.text,
            intent,
            confidence: synthesis.hypothesis.confidence,
            timeline: synthesis.timeline,
            hypothesis: synthesis.hypothesis,
            key_findings: synthesis.key_findings,
            incomplete: stop_reason.incomplete_reason().is_some(),
            flags,
            errors,
            final_state,
            stop_reason: Some(stop_reason),
            rounds_completed,
            tool_calls_executed: evidence.executed_calls(),
            cache_hits: evidence.cache_hits(),
            state_trace,
            records: evidence.records().to_vec(),
            elapsed_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        info!(
            root_cause = %result.hypothesis.root_cause,
            confidence = result.confidence,
            rounds = result.rounds_completed,
            calls = result.tool_calls_executed,
            incomplete = result.incomplete,
            elapsed_ms = result.elapsed_ms,
            "investigation complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::engines::StubReasoningEngine;
    use crate::adapters::tools::MockTool;
    use crate::domain::errors::{BudgetError, InitError};
    use crate::domain::models::{IncompleteReason, SchedulerState};
    use crate::domain::ports::EngineIntent;
    use crate::services::catalog::BuiltinTool;
    use serde_json::json;
    use std::time::Duration;

    fn investigator(engine: StubReasoningEngine) -> Investigator {
        let builder = BuiltinTool::ALL.iter().fold(ToolCatalog::builder(), |b, t| {
            b.register(t.spec(10), Arc::new(MockTool::returning(json!({}))))
        });
        Investigator::new(
            Arc::new(builder.build().unwrap()),
            Arc::new(engine),
            InvestigatorSettings::default(),
        )
    }

    fn troubleshooting() -> StubReasoningEngine {
        StubReasoningEngine::new().with_intent(EngineIntent {
            category: "troubleshooting".into(),
            confidence: 0.9,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_invalid_budget_returns_fatal_init() {
        let err = investigator(troubleshooting())
            .investigate("door", &Budget::standard().with_deadline(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvestigationError::FatalInit(InitError::Budget(BudgetError::ZeroDeadline))
        ));
        assert!(err.is_fatal_init());
    }

    #[tokio::test]
    async fn test_zero_rounds_is_incomplete_and_empty() {
        let result = investigator(troubleshooting())
            .investigate(
                "device 49aa8687-041e-471e-9188-8b0b13d930b3 is stuck",
                &Budget::standard().with_max_rounds(0),
            )
            .await
            .unwrap();
        assert!(result.incomplete);
        assert!(result.timeline.is_empty());
        assert_eq!(result.tool_calls_executed, 0);
        assert_eq!(result.final_state, SchedulerState::Aborted);
        assert!(result.has_flag(ResultFlag::Incomplete(IncompleteReason::BudgetExhausted)));
    }

    #[tokio::test]
    async fn test_engine_failure_flags_ambiguity_but_keeps_entities() {
        let engine = StubReasoningEngine::failing(crate::domain::errors::EngineError::Timeout);
        let result = investigator(engine)
            .investigate(
                "device 49aa8687-041e-471e-9188-8b0b13d930b3 is stuck",
                &Budget::standard(),
            )
            .await
            .unwrap();
        assert!(result.has_flag(ResultFlag::ParseAmbiguity));
        assert!(result.tool_calls_executed > 0);
        assert_eq!(result.records[0].tool(), "get_device_info");
    }

    #[test]
    fn test_blocking_wrapper() {
        let result = investigator(troubleshooting())
            .investigate_blocking("nothing to see", &Budget::debug())
            .unwrap();
        assert_eq!(result.final_state, SchedulerState::Done);
        assert!(!result.incomplete);
    }

    #[tokio::test]
    async fn test_blocking_wrapper_inside_runtime_is_an_error() {
        let err = investigator(troubleshooting())
            .investigate_blocking("nothing to see", &Budget::debug())
            .unwrap_err();
        assert!(matches!(err, InvestigationError::Runtime(_)));
    }
}
