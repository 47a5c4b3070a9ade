//! Tic-Tac-Toe
//!
//! 3×3 board, X moves first. In computer mode the human plays X and the CPU
//! answers as O with a uniformly random free cell after a short delay
//! counted in ticks. Win/draw/loss stats survive restarts.

use std::time::Duration;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::events::{Actor, GameEvent};
use crate::game::input::{InputEvent, Intent};
use crate::game::phase::Outcome;
use crate::game::render::{Color, Frame, GridLayout, TextAlign};
use crate::game::session::{Game, TickContext, TickResult};
use crate::games::{GameKind, Opponent, TURN_TICK};

/// Ticks the CPU waits before answering (500 ms).
pub const CPU_DELAY_TICKS: u32 = 5;

/// The eight winning triples: rows, columns, diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

const GRID: GridLayout = GridLayout::new(Vec2::new(20.0, 50.0), 100.0, 3, 3);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn other(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

/// Result of a finished board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Winner(Mark),
    Tie,
}

pub type Board = [Option<Mark>; 9];

/// Winner of the board, `Tie` when full without a line, `None` while open.
pub fn check_winner(board: &Board) -> Option<Verdict> {
    for [a, b, c] in WINNING_LINES {
        if let Some(mark) = board[a] {
            if board[b] == Some(mark) && board[c] == Some(mark) {
                return Some(Verdict::Winner(mark));
            }
        }
    }

    if board.iter().all(Option::is_some) {
        return Some(Verdict::Tie);
    }

    None
}

/// Win/draw/loss tally from X's point of view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

pub struct TicTacToe {
    opponent: Opponent,
    board: Board,
    current: Mark,
    verdict: Option<Verdict>,
    /// Ticks until the CPU plays, while it is O's turn in computer mode
    cpu_timer: Option<u32>,
    stats: Stats,
}

impl TicTacToe {
    pub fn new(opponent: Opponent) -> Self {
        Self {
            opponent,
            board: [None; 9],
            current: Mark::X,
            verdict: None,
            cpu_timer: None,
            stats: Stats::default(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current(&self) -> Mark {
        self.current
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    fn cpu_turn(&self) -> bool {
        self.opponent == Opponent::Computer && self.current == Mark::O
    }

    /// Place the current mark and hand the turn over, or finish the game.
    fn place(&mut self, cell: usize, tick: u32, result: &mut TickResult) {
        let mark = self.current;
        self.board[cell] = Some(mark);

        let actor = if self.opponent == Opponent::Computer && mark == Mark::O {
            Actor::Computer(0)
        } else {
            Actor::Human(if mark == Mark::X { 0 } else { 1 })
        };
        result.push(GameEvent::move_played(tick, actor, format!("{}{}", mark.symbol(), cell)));

        if let Some(verdict) = check_winner(&self.board) {
            self.finish(verdict, tick, result);
            return;
        }

        self.current = mark.other();
        if self.cpu_turn() {
            self.cpu_timer = Some(CPU_DELAY_TICKS);
        }
    }

    fn finish(&mut self, verdict: Verdict, tick: u32, result: &mut TickResult) {
        self.verdict = Some(verdict);
        self.cpu_timer = None;

        let outcome = match verdict {
            Verdict::Winner(Mark::X) => {
                self.stats.wins += 1;
                Outcome::Won
            }
            Verdict::Winner(Mark::O) => {
                self.stats.losses += 1;
                match self.opponent {
                    Opponent::Local => Outcome::Won,
                    Opponent::Computer => Outcome::Over,
                }
            }
            Verdict::Tie => {
                self.stats.draws += 1;
                Outcome::Over
            }
        };

        result.push(GameEvent::score_changed(tick, self.stats.wins));
        result.finish(outcome);
    }
}

impl Game for TicTacToe {
    fn kind(&self) -> GameKind {
        GameKind::TicTacToe
    }

    fn tick_period(&self) -> Duration {
        TURN_TICK
    }

    fn reset(&mut self, _rng: &mut DeterministicRng) {
        self.board = [None; 9];
        self.current = Mark::X;
        self.verdict = None;
        self.cpu_timer = None;
    }

    fn translate(&mut self, event: &InputEvent) -> Option<Intent> {
        match *event {
            InputEvent::CellClick { row, col } => Some(Intent::Select { row, col }),
            InputEvent::PointerDown { x, y } => {
                GRID.cell_at(x, y).map(|(row, col)| Intent::Select { row, col })
            }
            _ => None,
        }
    }

    fn apply(&mut self, intent: Intent, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();

        let Intent::Select { row, col } = intent else {
            return result;
        };
        if row > 2 || col > 2 {
            debug!(row, col, "Cell out of range");
            return result;
        }

        let cell = (row * 3 + col) as usize;
        if self.verdict.is_some() || self.cpu_turn() || self.board[cell].is_some() {
            debug!(cell, "Move rejected");
            return result;
        }

        self.place(cell, ctx.tick, &mut result);
        result
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();

        let Some(remaining) = self.cpu_timer else {
            return result;
        };
        if remaining > 1 {
            self.cpu_timer = Some(remaining - 1);
            return result;
        }
        self.cpu_timer = None;

        let free: Vec<usize> = (0..9).filter(|&i| self.board[i].is_none()).collect();
        if let Some(&cell) = ctx.rng.choose(&free) {
            self.place(cell, ctx.tick, &mut result);
        }
        result
    }

    fn render(&self, frame: &mut Frame) {
        frame.clear(Color::BLACK);

        let status = match self.verdict {
            Some(Verdict::Winner(mark)) => format!("{} wins", mark.symbol()),
            Some(Verdict::Tie) => "Draw".to_string(),
            None => format!("Turn: {}", self.current.symbol()),
        };
        frame.hud(0, status, Color::WHITE);
        frame.text(
            Vec2::new(330.0, 24.0),
            format!("W {}  D {}  L {}", self.stats.wins, self.stats.draws, self.stats.losses),
            16.0,
            Color::LIGHT_GRAY,
            TextAlign::Right,
        );

        for row in 0..3u8 {
            for col in 0..3u8 {
                frame.stroke_rect(GRID.cell_rect(row, col), Color::PURPLE, 2.0);
                if let Some(mark) = self.board[(row * 3 + col) as usize] {
                    let color = if mark == Mark::X { Color::PURPLE } else { Color::ORANGE };
                    let mut pos = GRID.cell_center(row, col);
                    pos.y += 20.0;
                    frame.text(pos, mark.symbol(), 60.0, color, TextAlign::Center);
                }
            }
        }
    }

    fn canvas_size(&self) -> (f32, f32) {
        GRID.canvas_size()
    }

    fn score(&self) -> u32 {
        self.stats.wins
    }
}
