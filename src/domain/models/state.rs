//! Scheduler state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one investigation's scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Created, nothing selected yet.
    Init,
    /// Asking the selection policy for the next round.
    Selecting,
    /// Running the round's invocations.
    Executing,
    /// Folding results into the evidence store.
    Evaluating,
    /// Finished normally.
    Done,
    /// Stopped by budget or deadline before any round completed.
    Aborted,
}

impl SchedulerState {
    /// Snake_case name, as serialized.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Selecting => "selecting",
            Self::Executing => "executing",
            Self::Evaluating => "evaluating",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Init => vec![Self::Selecting, Self::Aborted],
            Self::Selecting => vec![Self::Executing, Self::Done, Self::Aborted],
            Self::Executing => vec![Self::Evaluating],
            Self::Evaluating => vec![Self::Selecting, Self::Done, Self::Aborted],
            Self::Done | Self::Aborted => vec![],
        }
    }

    /// Whether `next` is a legal successor.
    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Whether no further transitions are possible.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_path_is_valid() {
        let path = [
            SchedulerState::Init,
            SchedulerState::Selecting,
            SchedulerState::Executing,
            SchedulerState::Evaluating,
            SchedulerState::Selecting,
            SchedulerState::Done,
        ];
        assert!(path.windows(2).all(|w| w[0].can_transition_to(w[1])));
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        assert!(!SchedulerState::Init.can_transition_to(SchedulerState::Executing));
        assert!(!SchedulerState::Executing.can_transition_to(SchedulerState::Done));
        assert!(!SchedulerState::Done.can_transition_to(SchedulerState::Selecting));
        assert!(SchedulerState::Aborted.valid_transitions().is_empty());
    }
}
