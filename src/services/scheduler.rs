//! Round scheduler.
//!
//! Drives one investigation through its state machine. Each round is
//! selected by the policy, executed concurrently under a semaphore, and
//! evaluated in selection order before the next round may start.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::domain::errors::{DomainResult, InitError, InvestigationError, ToolError};
use crate::domain::models::{
    Budget, CacheKey, CallOutcome, DeadlineClock, Intent, RemainingBudget, SchedulerState,
    StopReason, ToolInvocation,
};
use crate::services::catalog::ToolCatalog;
use crate::services::evidence_store::EvidenceStore;
use crate::services::normalizer::EvidenceNormalizer;
use crate::services::selection_policy::ToolSelectionPolicy;
use crate::services::termination::TerminationPolicy;

/// Event emitted while an investigation runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// The state machine moved.
    StateChanged {
        /// Previous state.
        from: SchedulerState,
        /// New state.
        to: SchedulerState,
    },
    /// A round began.
    RoundStarted {
        /// Round index.
        round: u32,
        /// Invocations selected.
        invocations: usize,
    },
    /// One invocation resolved.
    CallFinished {
        /// Round index.
        round: u32,
        /// Tool called.
        tool: String,
        /// Whether the call succeeded.
        success: bool,
        /// Whether the outcome came from the cache.
        cache_hit: bool,
    },
    /// A round's results were evaluated.
    RoundCompleted {
        /// Round index.
        round: u32,
        /// Calls executed in the round.
        executed: usize,
        /// Invocations answered from the cache.
        cache_hits: usize,
    },
    /// No further rounds will run.
    Stopped {
        /// Why rounds stopped.
        reason: StopReason,
    },
}

/// Outcome of a scheduler run.
#[derive(Debug)]
pub struct SchedulerOutcome {
    /// Everything collected.
    pub evidence: EvidenceStore,
    /// `Done` or `Aborted`.
    pub final_state: SchedulerState,
    /// Why rounds stopped.
    pub stop_reason: StopReason,
    /// Rounds that ran to completion.
    pub rounds_completed: u32,
    /// Every state entered, in order.
    pub state_trace: Vec<SchedulerState>,
}

/// How one slot of a round was resolved.
#[derive(Debug, Clone)]
enum Resolution {
    /// Already in the cache before the round started.
    Cached,
    /// Same key as an earlier slot in this round.
    Duplicate,
    Executed {
        outcome: CallOutcome,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
}

/// Scheduler state plus the trace of every state entered.
struct Machine {
    state: SchedulerState,
    trace: Vec<SchedulerState>,
}

impl Machine {
    fn new() -> Self {
        Self {
            state: SchedulerState::Init,
            trace: vec![SchedulerState::Init],
        }
    }

    fn transition(
        &mut self,
        to: SchedulerState,
        events: &mpsc::Sender<SchedulerEvent>,
    ) -> DomainResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(InvestigationError::InvalidStateTransition {
                from: self.state,
                to,
            });
        }
        let _ = events.try_send(SchedulerEvent::StateChanged {
            from: self.state,
            to,
        });
        self.state = to;
        self.trace.push(to);
        Ok(())
    }
}

/// Runs rounds of tool calls under a budget.
pub struct ExecutionScheduler {
    catalog: Arc<ToolCatalog>,
    policy: ToolSelectionPolicy,
    termination: TerminationPolicy,
    normalizer: EvidenceNormalizer,
}

impl ExecutionScheduler {
    /// Scheduler over `catalog`, selecting with `policy`.
    pub fn new(catalog: Arc<ToolCatalog>, policy: ToolSelectionPolicy) -> Self {
        Self {
            catalog,
            policy,
            termination: TerminationPolicy,
            normalizer: EvidenceNormalizer,
        }
    }

    /// Run rounds until the termination policy stops us.
    pub async fn run(
        &self,
        intent: &Intent,
        budget: &Budget,
        clock: &DeadlineClock,
    ) -> DomainResult<SchedulerOutcome> {
        let (tx, _rx) = mpsc::channel(1);
        self.run_with_events(intent, budget, clock, tx).await
    }

    /// Run with event streaming. Events are dropped when the channel is full.
    pub async fn run_with_events(
        &self,
        intent: &Intent,
        budget: &Budget,
        clock: &DeadlineClock,
        events: mpsc::Sender<SchedulerEvent>,
    ) -> DomainResult<SchedulerOutcome> {
        budget.validate()?;
        if self.catalog.is_empty() {
            return Err(InitError::EmptyCatalog.into());
        }

        let mut machine = Machine::new();
        let mut evidence = EvidenceStore::new();
        let mut rounds_completed = 0u32;

        let stop = loop {
            machine.transition(SchedulerState::Selecting, &events)?;
            if let Some(reason) =
                self.termination
                    .stop_reason(&evidence, rounds_completed, budget, clock, false)
            {
                break reason;
            }

            let remaining =
                RemainingBudget::compute(budget, rounds_completed, evidence.executed_calls(), clock);
            let selection = self
                .policy
                .select(intent, &evidence, rounds_completed, &remaining)
                .await;
            if let Some(reason) = self.termination.stop_reason(
                &evidence,
                rounds_completed,
                budget,
                clock,
                selection.is_empty(),
            ) {
                break reason;
            }

            machine.transition(SchedulerState::Executing, &events)?;
            let round = rounds_completed;
            let _ = events.try_send(SchedulerEvent::RoundStarted {
                round,
                invocations: selection.len(),
            });
            let span = info_span!("round", round, invocations = selection.len());
            let resolutions = self
                .execute_round(&selection, &evidence, budget, clock)
                .instrument(span)
                .await;

            machine.transition(SchedulerState::Evaluating, &events)?;
            let before = (evidence.executed_calls(), evidence.cache_hits());
            self.evaluate(&mut evidence, selection, resolutions, &events);
            rounds_completed += 1;
            let _ = events.try_send(SchedulerEvent::RoundCompleted {
                round,
                executed: evidence.executed_calls() - before.0,
                cache_hits: evidence.cache_hits() - before.1,
            });

            if let Some(reason) =
                self.termination
                    .stop_reason(&evidence, rounds_completed, budget, clock, false)
            {
                break reason;
            }
        };

        let final_state = if rounds_completed == 0 && stop != StopReason::NoCandidates {
            SchedulerState::Aborted
        } else {
            SchedulerState::Done
        };
        machine.transition(final_state, &events)?;
        let _ = events.try_send(SchedulerEvent::Stopped { reason: stop });

        match stop {
            StopReason::DeadlineExceeded => warn!(rounds_completed, "investigation deadline reached"),
            _ => info!(rounds_completed, reason = ?stop, state = %final_state, "scheduler stopped"),
        }

        Ok(SchedulerOutcome {
            evidence,
            final_state,
            stop_reason: stop,
            rounds_completed,
            state_trace: machine.trace,
        })
    }

    /// Execute one round's misses concurrently and resolve every slot.
    ///
    /// Calls still running at the deadline are aborted and resolved as
    /// `deadline_exceeded`.
    async fn execute_round(
        &self,
        selection: &[ToolInvocation],
        evidence: &EvidenceStore,
        budget: &Budget,
        clock: &DeadlineClock,
    ) -> Vec<Resolution> {
        let semaphore = Arc::new(Semaphore::new(budget.max_tools_per_round));
        let mut slots: Vec<Option<Resolution>> = vec![None; selection.len()];
        let mut first_by_key: HashMap<CacheKey, usize> = HashMap::new();
        let mut dispatched_at: HashMap<usize, DateTime<Utc>> = HashMap::new();
        let mut task_slots = HashMap::new();
        let mut tasks = JoinSet::new();

        for (index, invocation) in selection.iter().enumerate() {
            let key = invocation.cache_key();
            if evidence.is_cached(&key) {
                slots[index] = Some(Resolution::Cached);
                continue;
            }
            if first_by_key.contains_key(&key) {
                slots[index] = Some(Resolution::Duplicate);
                continue;
            }
            first_by_key.insert(key, index);

            let now = Utc::now();
            let Some(executor) = self.catalog.executor(&invocation.tool) else {
                slots[index] = Some(Resolution::Executed {
                    outcome: CallOutcome::Failure(ToolError::invalid_args(format!(
                        "unknown tool: {}",
                        invocation.tool
                    ))),
                    started_at: now,
                    finished_at: now,
                });
                continue;
            };

            let semaphore = Arc::clone(&semaphore);
            let args = invocation.args.clone();
            let call_timeout = budget.call_timeout;
            dispatched_at.insert(index, now);
            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let started_at = Utc::now();
                let outcome = match timeout(call_timeout, executor.execute(&args)).await {
                    Ok(result) => CallOutcome::from(result),
                    Err(_) => CallOutcome::Failure(ToolError::timeout(call_timeout)),
                };
                (index, outcome, started_at, Utc::now())
            });
            task_slots.insert(handle.id(), index);
        }

        let deadline = tokio::time::sleep_until(clock.deadline());
        tokio::pin!(deadline);

        while !tasks.is_empty() {
            tokio::select! {
                biased;
                joined = tasks.join_next() => match joined {
                    Some(Ok((index, outcome, started_at, finished_at))) => {
                        slots[index] = Some(Resolution::Executed { outcome, started_at, finished_at });
                    }
                    Some(Err(err)) => {
                        if let Some(&index) = task_slots.get(&err.id()) {
                            warn!(tool = %selection[index].tool, error = %err, "tool task failed");
                            let now = Utc::now();
                            slots[index] = Some(Resolution::Executed {
                                outcome: CallOutcome::Failure(ToolError::upstream(format!("tool task failed: {err}"))),
                                started_at: dispatched_at.get(&index).copied().unwrap_or(now),
                                finished_at: now,
                            });
                        }
                    }
                    None => break,
                },
                () = &mut deadline => {
                    warn!(outstanding = tasks.len(), "deadline reached, abandoning in-flight calls");
                    tasks.abort_all();
                    break;
                }
            }
        }

        let now = Utc::now();
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| Resolution::Executed {
                    outcome: CallOutcome::Failure(ToolError::deadline_exceeded()),
                    started_at: dispatched_at.get(&index).copied().unwrap_or(now),
                    finished_at: now,
                })
            })
            .collect()
    }

    /// Append records in selection order and derive evidence from successes.
    fn evaluate(
        &self,
        evidence: &mut EvidenceStore,
        selection: Vec<ToolInvocation>,
        resolutions: Vec<Resolution>,
        events: &mpsc::Sender<SchedulerEvent>,
    ) {
        for (invocation, resolution) in selection.into_iter().zip(resolutions) {
            let round = invocation.round;
            let tool = invocation.tool.clone();
            let record = match resolution {
                Resolution::Executed {
                    outcome,
                    started_at,
                    finished_at,
                } => {
                    let normalized = match (self.catalog.spec(&tool), outcome.payload()) {
                        (Some(spec), Some(payload)) => Some(self.normalizer.normalize(spec, payload)),
                        _ => None,
                    };
                    Some(evidence.record_execution(
                        invocation,
                        outcome,
                        started_at,
                        finished_at,
                        normalized,
                    ))
                }
                Resolution::Cached | Resolution::Duplicate => {
                    evidence.record_cache_hit(invocation, Utc::now())
                }
            };

            let Some(record) = record else {
                warn!(tool = %tool, "cache hit without an executed record");
                continue;
            };
            match record.outcome.error() {
                Some(err) if !record.is_cache_hit() => {
                    warn!(tool = %tool, round, kind = %err.kind, error = %err.message, "tool call failed");
                }
                _ => debug!(
                    tool = %tool,
                    round,
                    duration_ms = record.duration_ms(),
                    cache_hit = record.is_cache_hit(),
                    "tool call resolved"
                ),
            }
            let _ = events.try_send(SchedulerEvent::CallFinished {
                round,
                tool,
                success: record.is_success(),
                cache_hit: record.is_cache_hit(),
            });
        }
    }
}
