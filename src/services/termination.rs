//! Decides when the scheduler stops issuing rounds.

use crate::domain::models::{Budget, DeadlineClock, StopReason};
use crate::services::evidence_store::EvidenceStore;

/// Stop conditions for the scheduler loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminationPolicy;

impl TerminationPolicy {
    /// Reason to stop before the next round, if any.
    ///
    /// Checked in order: deadline, call budget, round budget, empty selection.
    pub fn stop_reason(
        &self,
        evidence: &EvidenceStore,
        rounds_completed: u32,
        budget: &Budget,
        clock: &DeadlineClock,
        last_selection_empty: bool,
    ) -> Option<StopReason> {
        if clock.expired() {
            return Some(StopReason::DeadlineExceeded);
        }
        if evidence.executed_calls() >= budget.max_total_tool_calls {
            return Some(StopReason::CallsExhausted);
        }
        if rounds_completed >= budget.max_rounds {
            return Some(StopReason::RoundsExhausted);
        }
        if last_selection_empty {
            return Some(StopReason::NoCandidates);
        }
        None
    }

    /// Whether any stop condition holds.
    pub fn should_stop(
        &self,
        evidence: &EvidenceStore,
        rounds_completed: u32,
        budget: &Budget,
        clock: &DeadlineClock,
        last_selection_empty: bool,
    ) -> bool {
        self.stop_reason(evidence, rounds_completed, budget, clock, last_selection_empty)
            .is_some()
    }
}
