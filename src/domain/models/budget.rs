//! Investigation budgets and the deadline clock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::errors::BudgetError;

/// Named budget presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetProfile {
    /// Three rounds of up to five tools, two minutes overall.
    #[default]
    Standard,
    /// Tighter limits for live support traffic.
    Production,
    /// Generous limits for local debugging.
    Debug,
}

impl BudgetProfile {
    /// Lowercase profile name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Production => "production",
            Self::Debug => "debug",
        }
    }

    /// Limits this profile stands for.
    pub const fn budget(&self) -> Budget {
        match self {
            Self::Standard => Budget::standard(),
            Self::Production => Budget::production(),
            Self::Debug => Budget::debug(),
        }
    }
}

impl fmt::Display for BudgetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "default" => Ok(Self::Standard),
            "production" | "prod" => Ok(Self::Production),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown budget profile: {other}")),
        }
    }
}

/// Hard limits for one investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Rounds of tool selection and execution.
    pub max_rounds: u32,
    /// Invocations executed concurrently in one round.
    pub max_tools_per_round: usize,
    /// Executed calls across the whole investigation; cache hits are free.
    pub max_total_tool_calls: usize,
    /// Wall-clock limit for the whole investigation.
    pub deadline: Duration,
    /// Limit for each individual tool call.
    pub call_timeout: Duration,
}

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

impl Budget {
    /// Limits of the `standard` profile.
    pub const fn standard() -> Self {
        Self {
            max_rounds: 3,
            max_tools_per_round: 5,
            max_total_tool_calls: 10,
            deadline: Duration::from_secs(120),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Limits of the `production` profile.
    pub const fn production() -> Self {
        Self {
            max_rounds: 2,
            max_tools_per_round: 3,
            max_total_tool_calls: 6,
            deadline: Duration::from_secs(90),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Limits of the `debug` profile.
    pub const fn debug() -> Self {
        Self {
            max_rounds: 5,
            max_tools_per_round: 8,
            max_total_tool_calls: 20,
            deadline: Duration::from_secs(300),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Overrides the round limit.
    #[must_use]
    pub const fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Overrides the per-round concurrency limit.
    #[must_use]
    pub const fn with_max_tools_per_round(mut self, tools: usize) -> Self {
        self.max_tools_per_round = tools;
        self
    }

    /// Overrides the total call limit.
    #[must_use]
    pub const fn with_max_total_tool_calls(mut self, calls: usize) -> Self {
        self.max_total_tool_calls = calls;
        self
    }

    /// Overrides the wall-clock deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Overrides the per-call timeout.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Rejects values that make an investigation impossible to run.
    ///
    /// Zero rounds or zero total calls are accepted: they end the
    /// investigation gracefully with an incomplete result.
    pub fn validate(&self) -> Result<(), BudgetError> {
        if self.max_tools_per_round == 0 {
            return Err(BudgetError::ZeroToolsPerRound);
        }
        if self.deadline.is_zero() {
            return Err(BudgetError::ZeroDeadline);
        }
        if self.call_timeout.is_zero() {
            return Err(BudgetError::ZeroCallTimeout);
        }
        Ok(())
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::standard()
    }
}

/// Investigation clock started when the investigation begins.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineClock {
    started: Instant,
    deadline: Instant,
}

impl DeadlineClock {
    /// Starts a clock that expires `limit` from now.
    pub fn start(limit: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + limit,
        }
    }

    /// Instant at which the investigation must stop.
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time since the clock started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// What is left of a budget at the start of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingBudget {
    /// Rounds still allowed.
    pub rounds: u32,
    /// Executed calls still allowed.
    pub calls: usize,
    /// Per-round concurrency limit.
    pub per_round: usize,
    /// Wall-clock time until the deadline.
    pub time_left: Duration,
}

impl RemainingBudget {
    /// Snapshot of what `budget` leaves after the given consumption.
    pub fn compute(
        budget: &Budget,
        rounds_completed: u32,
        calls_executed: usize,
        clock: &DeadlineClock,
    ) -> Self {
        Self {
            rounds: budget.max_rounds.saturating_sub(rounds_completed),
            calls: budget.max_total_tool_calls.saturating_sub(calls_executed),
            per_round: budget.max_tools_per_round,
            time_left: clock.remaining(),
        }
    }

    /// Maximum number of invocations the next round may contain.
    pub fn round_capacity(&self) -> usize {
        if self.rounds == 0 || self.time_left.is_zero() {
            return 0;
        }
        self.per_round.min(self.calls)
    }
}
