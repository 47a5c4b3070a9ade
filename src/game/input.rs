//! Input Adapter
//!
//! Raw device events (keyboard, pointer, touch, DOM cell edits) arrive as
//! [`InputEvent`]. Each game translates them into an [`Intent`], the
//! game-level meaning of the event. Everything that can be malformed is
//! rejected here, before it reaches game state.

use serde::{Serialize, Deserialize};
use thiserror::Error;

// =============================================================================
// RAW EVENTS
// =============================================================================

/// Keys the games react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    W,
    A,
    S,
    D,
    Space,
    Enter,
    Escape,
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value.
    pub fn from_dom(key: &str) -> Option<Key> {
        let key = match key {
            "ArrowUp" => Key::ArrowUp,
            "ArrowDown" => Key::ArrowDown,
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "w" | "W" => Key::W,
            "a" | "A" => Key::A,
            "s" | "S" => Key::S,
            "d" | "D" => Key::D,
            " " | "Space" | "Spacebar" => Key::Space,
            "Enter" => Key::Enter,
            "Escape" | "Esc" => Key::Escape,
            _ => return None,
        };
        Some(key)
    }
}

/// A raw input event, in canvas coordinates where positional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    /// Key pressed
    KeyDown { key: Key },
    /// Pointer moved over the canvas
    PointerMove { x: f32, y: f32 },
    /// Pointer pressed (mouse down or click)
    PointerDown { x: f32, y: f32 },
    /// Pointer released
    PointerUp,
    /// Touch began
    TouchStart { x: f32, y: f32 },
    /// Touch moved
    TouchMove { x: f32, y: f32 },
    /// Touch ended
    TouchEnd,
    /// A board cell was clicked
    CellClick { row: u8, col: u8 },
    /// Text typed into a board cell (sudoku)
    CellText { row: u8, col: u8, text: String },
    /// Dice button pressed (ludo)
    RollDice,
    /// A token was picked (ludo)
    SelectToken { token: u8 },
}

// =============================================================================
// INTENTS
// =============================================================================

/// Cardinal direction on a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Direction for an arrow or WASD key.
    pub fn from_key(key: Key) -> Option<Direction> {
        match key {
            Key::ArrowUp | Key::W => Some(Direction::Up),
            Key::ArrowDown | Key::S => Some(Direction::Down),
            Key::ArrowLeft | Key::A => Some(Direction::Left),
            Key::ArrowRight | Key::D => Some(Direction::Right),
            _ => None,
        }
    }

    /// Whether `other` points the opposite way.
    pub fn is_opposite(self, other: Direction) -> bool {
        matches!(
            (self, other),
            (Direction::Up, Direction::Down)
                | (Direction::Down, Direction::Up)
                | (Direction::Left, Direction::Right)
                | (Direction::Right, Direction::Left)
        )
    }

    /// Grid step as `(dx, dy)`, +y down.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// What an input means to a game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Change heading (snake)
    Steer { direction: Direction },
    /// Jump or flap (flappy, dino)
    Jump,
    /// Move the player paddle's leading edge to this coordinate (pong, breakout)
    PaddleTo { position: f32 },
    /// Rotate the tower by this many degrees (helix)
    Rotate { degrees: f32 },
    /// Click a board cell (tic-tac-toe, chess)
    Select { row: u8, col: u8 },
    /// Set or clear a puzzle cell (sudoku)
    Enter { row: u8, col: u8, value: Option<u8> },
    /// Roll the dice (ludo)
    RollDice,
    /// Move one of the current player's tokens (ludo)
    MoveToken { token: u8 },
}

/// Input rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("cell value must be empty or a digit 1-9, got {0:?}")]
    InvalidCellValue(String),

    #[error("cell ({row}, {col}) is outside the board")]
    CellOutOfRange { row: u8, col: u8 },
}

/// Parse the text of a puzzle cell: empty clears, `1`..=`9` sets.
pub fn parse_cell_value(text: &str) -> Result<Option<u8>, InputError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match trimmed.parse::<u8>() {
        Ok(value) if (1..=9).contains(&value) && trimmed.len() == 1 => Ok(Some(value)),
        _ => Err(InputError::InvalidCellValue(text.to_string())),
    }
}

/// Leading edge of a paddle of length `len` centred on `pointer`, clamped so
/// the paddle stays inside a field of length `field`.
#[inline]
pub fn center_paddle(pointer: f32, len: f32, field: f32) -> f32 {
    (pointer - len / 2.0).clamp(0.0, field - len)
}

// =============================================================================
// DRAG TRACKING
// =============================================================================

/// Tracks horizontal drag distance between press and release.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DragTracker {
    last_x: Option<f32>,
}

impl DragTracker {
    /// Begin a drag at `x`.
    pub fn press(&mut self, x: f32) {
        self.last_x = Some(x);
    }

    /// Move to `x`; returns the horizontal delta if a drag is active.
    pub fn drag(&mut self, x: f32) -> Option<f32> {
        let last = self.last_x?;
        self.last_x = Some(x);
        Some(x - last)
    }

    /// End the drag.
    pub fn release(&mut self) {
        self.last_x = None;
    }

    /// Whether a drag is in progress.
    pub fn is_dragging(&self) -> bool {
        self.last_x.is_some()
    }
}
