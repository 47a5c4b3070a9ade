//! Game Catalog
//!
//! The ten portal games and the factory that builds them from a slug and
//! options.
//!
//! | slug          | tick   | mode options                          |
//! |---------------|--------|---------------------------------------|
//! | `tic-tac-toe` | 100 ms | `local`, `computer`                   |
//! | `snake-game`  | 150 ms |                                       |
//! | `sudoku`      | 100 ms |                                       |
//! | `chess`       | 100 ms | `local`, `computer`                   |
//! | `pong`        | 16 ms  |                                       |
//! | `flappy-bird` | 16 ms  |                                       |
//! | `ludo`        | 100 ms | `1p-3cpu`, `2p-2cpu`, `3p-1cpu`, `local` |
//! | `breakout`    | 16 ms  |                                       |
//! | `dino-run`    | 16 ms  |                                       |
//! | `helix-jump`  | 16 ms  |                                       |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::session::Game;

pub mod tictactoe;
pub mod snake;
pub mod sudoku;
pub mod chess;
pub mod pong;
pub mod flappy;
pub mod ludo;
pub mod breakout;
pub mod dino;
pub mod helix;

pub use tictactoe::TicTacToe;
pub use snake::Snake;
pub use sudoku::Sudoku;
pub use chess::Chess;
pub use pong::Pong;
pub use flappy::FlappyBird;
pub use ludo::Ludo;
pub use breakout::Breakout;
pub use dino::DinoRun;
pub use helix::HelixJump;

/// Tick period of the real-time arcade games (~60 Hz).
pub const ARCADE_TICK: Duration = Duration::from_millis(16);

/// Tick period of turn-based games, which only use ticks to pace the CPU.
pub const TURN_TICK: Duration = Duration::from_millis(100);

/// Identifies a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameKind {
    #[serde(rename = "tic-tac-toe")]
    TicTacToe,
    #[serde(rename = "snake-game")]
    Snake,
    #[serde(rename = "sudoku")]
    Sudoku,
    #[serde(rename = "chess")]
    Chess,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "flappy-bird")]
    Flappy,
    #[serde(rename = "ludo")]
    Ludo,
    #[serde(rename = "breakout")]
    Breakout,
    #[serde(rename = "dino-run")]
    Dino,
    #[serde(rename = "helix-jump")]
    Helix,
}

impl GameKind {
    /// Every game, in catalog order.
    pub const ALL: [GameKind; 10] = [
        GameKind::TicTacToe,
        GameKind::Snake,
        GameKind::Sudoku,
        GameKind::Chess,
        GameKind::Pong,
        GameKind::Flappy,
        GameKind::Ludo,
        GameKind::Breakout,
        GameKind::Dino,
        GameKind::Helix,
    ];

    /// URL slug, also used as the score `game_type`.
    pub const fn slug(self) -> &'static str {
        match self {
            GameKind::TicTacToe => "tic-tac-toe",
            GameKind::Snake => "snake-game",
            GameKind::Sudoku => "sudoku",
            GameKind::Chess => "chess",
            GameKind::Pong => "pong",
            GameKind::Flappy => "flappy-bird",
            GameKind::Ludo => "ludo",
            GameKind::Breakout => "breakout",
            GameKind::Dino => "dino-run",
            GameKind::Helix => "helix-jump",
        }
    }

    /// Display title.
    pub const fn title(self) -> &'static str {
        match self {
            GameKind::TicTacToe => "Tic Tac Toe",
            GameKind::Snake => "Snake Game",
            GameKind::Sudoku => "Sudoku",
            GameKind::Chess => "Chess",
            GameKind::Pong => "Pong",
            GameKind::Flappy => "Flappy Bird",
            GameKind::Ludo => "Ludo",
            GameKind::Breakout => "Breakout",
            GameKind::Dino => "Dino Run",
            GameKind::Helix => "Helix Jump",
        }
    }

    pub fn from_slug(slug: &str) -> Option<GameKind> {
        GameKind::ALL.into_iter().find(|k| k.slug() == slug)
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for GameKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameKind::from_slug(s).ok_or_else(|| GameError::UnknownGame(s.to_string()))
    }
}

/// Options accepted when opening a game.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOptions {
    /// Game-specific mode (see the module table)
    #[serde(default)]
    pub mode: Option<String>,
}

impl GameOptions {
    pub fn with_mode(mode: impl Into<String>) -> Self {
        Self { mode: Some(mode.into()) }
    }
}

/// Errors building a game.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("unknown game: {0}")]
    UnknownGame(String),

    #[error("{game} has no mode {mode:?}")]
    InvalidMode { game: GameKind, mode: String },
}

/// Two-sided board game opponent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opponent {
    /// Two humans on one device
    #[default]
    Local,
    /// Human versus random-move CPU
    Computer,
}

impl Opponent {
    fn parse(game: GameKind, mode: Option<&str>) -> Result<Opponent, GameError> {
        match mode {
            None | Some("local") => Ok(Opponent::Local),
            Some("computer") => Ok(Opponent::Computer),
            Some(other) => Err(GameError::InvalidMode {
                game,
                mode: other.to_string(),
            }),
        }
    }
}

/// Build a game from its kind and options.
pub fn build_game(kind: GameKind, options: &GameOptions) -> Result<Box<dyn Game>, GameError> {
    let mode = options.mode.as_deref();

    let reject_mode = |mode: Option<&str>| match mode {
        None => Ok(()),
        Some(m) => Err(GameError::InvalidMode {
            game: kind,
            mode: m.to_string(),
        }),
    };

    let game: Box<dyn Game> = match kind {
        GameKind::TicTacToe => Box::new(TicTacToe::new(Opponent::parse(kind, mode)?)),
        GameKind::Chess => Box::new(Chess::new(Opponent::parse(kind, mode)?)),
        GameKind::Ludo => {
            let ludo_mode = match mode {
                None => ludo::LudoMode::default(),
                Some(m) => m.parse().map_err(|_| GameError::InvalidMode {
                    game: kind,
                    mode: m.to_string(),
                })?,
            };
            Box::new(Ludo::new(ludo_mode))
        }
        GameKind::Snake => {
            reject_mode(mode)?;
            Box::new(Snake::new())
        }
        GameKind::Sudoku => {
            reject_mode(mode)?;
            Box::new(Sudoku::new())
        }
        GameKind::Pong => {
            reject_mode(mode)?;
            Box::new(Pong::new())
        }
        GameKind::Flappy => {
            reject_mode(mode)?;
            Box::new(FlappyBird::new())
        }
        GameKind::Breakout => {
            reject_mode(mode)?;
            Box::new(Breakout::new())
        }
        GameKind::Dino => {
            reject_mode(mode)?;
            Box::new(DinoRun::new())
        }
        GameKind::Helix => {
            reject_mode(mode)?;
            Box::new(HelixJump::new())
        }
    };

    Ok(game)
}
