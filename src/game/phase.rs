//! Session Phase
//!
//! The lifecycle shared by every game:
//!
//! ```text
//! Idle ──start──▶ Running ◀──resume── Paused
//!                  │  └────pause────────▲
//!                  ├──finish(Over)──▶ Over ──restart──▶ Idle
//!                  └──finish(Won)───▶ Won  ──restart──▶ Idle
//! ```
//!
//! A single enum makes "exactly one of idle/running/paused/over/won"
//! hold by construction.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Lifecycle phase of a game session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Constructed or restarted, waiting for start.
    #[default]
    Idle,
    /// Ticking.
    Running,
    /// Explicitly paused; no ticks, no game input.
    Paused,
    /// Lost (lethal collision, lives exhausted, opponent won).
    Over,
    /// Objective completed.
    Won,
}

/// How a session terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Game over
    Over,
    /// Game won
    Won,
}

impl From<Outcome> for Phase {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Over => Phase::Over,
            Outcome::Won => Phase::Won,
        }
    }
}

/// A requested lifecycle transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Idle -> Running
    Start,
    /// Running -> Paused
    Pause,
    /// Paused -> Running
    Resume,
    /// Running -> Over | Won
    Finish(Outcome),
    /// any -> Idle
    Restart,
}

impl Phase {
    /// Whether the simulation is stopped for good (until restart).
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Over | Phase::Won)
    }

    /// Whether ticks and game input are being processed.
    #[inline]
    pub fn is_running(self) -> bool {
        self == Phase::Running
    }

    /// Compute the phase after `transition`, or `None` if it is not allowed.
    pub fn apply(self, transition: Transition) -> Option<Phase> {
        match (self, transition) {
            (Phase::Idle, Transition::Start) => Some(Phase::Running),
            (Phase::Running, Transition::Pause) => Some(Phase::Paused),
            (Phase::Paused, Transition::Resume) => Some(Phase::Running),
            (Phase::Running, Transition::Finish(outcome)) => Some(outcome.into()),
            (_, Transition::Restart) => Some(Phase::Idle),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Paused => "paused",
            Phase::Over => "over",
            Phase::Won => "won",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 5] = [Phase::Idle, Phase::Running, Phase::Paused, Phase::Over, Phase::Won];

    #[test]
    fn test_happy_path() {
        let phase = Phase::Idle;
        let phase = phase.apply(Transition::Start).unwrap();
        assert_eq!(phase, Phase::Running);

        let phase = phase.apply(Transition::Pause).unwrap();
        assert_eq!(phase, Phase::Paused);

        let phase = phase.apply(Transition::Resume).unwrap();
        assert_eq!(phase, Phase::Running);

        let phase = phase.apply(Transition::Finish(Outcome::Won)).unwrap();
        assert_eq!(phase, Phase::Won);
        assert!(phase.is_terminal());

        assert_eq!(phase.apply(Transition::Restart), Some(Phase::Idle));
    }

    #[test]
    fn test_rejected_transitions() {
        assert_eq!(Phase::Idle.apply(Transition::Pause), None);
        assert_eq!(Phase::Idle.apply(Transition::Resume), None);
        assert_eq!(Phase::Idle.apply(Transition::Finish(Outcome::Over)), None);
        assert_eq!(Phase::Running.apply(Transition::Start), None);
        assert_eq!(Phase::Paused.apply(Transition::Pause), None);
        assert_eq!(Phase::Paused.apply(Transition::Finish(Outcome::Won)), None);
        assert_eq!(Phase::Over.apply(Transition::Start), None);
        assert_eq!(Phase::Won.apply(Transition::Resume), None);
    }

    #[test]
    fn test_restart_allowed_everywhere() {
        for phase in ALL {
            assert_eq!(phase.apply(Transition::Restart), Some(Phase::Idle));
        }
    }

    #[test]
    fn test_only_terminal_phases_are_terminal() {
        let terminal: Vec<Phase> = ALL.into_iter().filter(|p| p.is_terminal()).collect();
        assert_eq!(terminal, vec![Phase::Over, Phase::Won]);
        assert!(Phase::Running.is_running());
        assert!(!Phase::Paused.is_running());
    }
}
