//! Game Events
//!
//! Events emitted by game engines during a tick or while applying input.
//! The session layer forwards them to observers and uses `GameEnded`
//! to record scores.

use serde::{Serialize, Deserialize};
use crate::game::phase::{Outcome, Phase};

/// Who performed a move in a turn-based game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// A local human seat (0-based)
    Human(u8),
    /// A computer-controlled seat (0-based)
    Computer(u8),
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEventData {
    /// Running score changed
    ScoreChanged {
        score: u32,
    },

    /// Two-sided score changed (pong)
    PointScored {
        player: u32,
        opponent: u32,
    },

    /// A life was lost
    LifeLost {
        lives_remaining: u32,
    },

    /// A discrete move was played (board games)
    MovePlayed {
        actor: Actor,
        notation: String,
    },

    /// Dice rolled (ludo)
    DiceRolled {
        seat: u8,
        value: u8,
    },

    /// Turn passed to another seat
    TurnChanged {
        seat: u8,
    },

    /// Session phase changed
    PhaseChanged {
        old_phase: Phase,
        new_phase: Phase,
    },

    /// Game reached a terminal outcome
    GameEnded {
        outcome: Outcome,
        score: u32,
        duration_ticks: u32,
    },
}

/// A game event stamped with the tick it occurred on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Create score changed event.
    pub fn score_changed(tick: u32, score: u32) -> Self {
        Self::new(tick, GameEventData::ScoreChanged { score })
    }

    /// Create point scored event.
    pub fn point_scored(tick: u32, player: u32, opponent: u32) -> Self {
        Self::new(tick, GameEventData::PointScored { player, opponent })
    }

    /// Create life lost event.
    pub fn life_lost(tick: u32, lives_remaining: u32) -> Self {
        Self::new(tick, GameEventData::LifeLost { lives_remaining })
    }

    /// Create move played event.
    pub fn move_played(tick: u32, actor: Actor, notation: impl Into<String>) -> Self {
        Self::new(
            tick,
            GameEventData::MovePlayed {
                actor,
                notation: notation.into(),
            },
        )
    }

    /// Create dice rolled event.
    pub fn dice_rolled(tick: u32, seat: u8, value: u8) -> Self {
        Self::new(tick, GameEventData::DiceRolled { seat, value })
    }

    /// Create turn changed event.
    pub fn turn_changed(tick: u32, seat: u8) -> Self {
        Self::new(tick, GameEventData::TurnChanged { seat })
    }

    /// Create phase changed event.
    pub fn phase_changed(tick: u32, old_phase: Phase, new_phase: Phase) -> Self {
        Self::new(tick, GameEventData::PhaseChanged { old_phase, new_phase })
    }

    /// Create game ended event.
    pub fn game_ended(tick: u32, outcome: Outcome, score: u32) -> Self {
        Self::new(
            tick,
            GameEventData::GameEnded {
                outcome,
                score,
                duration_ticks: tick,
            },
        )
    }

    /// Whether this event ends the game.
    pub fn is_terminal(&self) -> bool {
        matches!(self.data, GameEventData::GameEnded { .. })
    }
}
