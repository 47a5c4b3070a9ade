//! Sudoku
//!
//! A fixed starter puzzle. Given cells are locked; every entry re-validates
//! the whole grid, and a valid, fully filled grid wins.

use std::time::Duration;
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::core::vec2::{Rect, Vec2};
use crate::game::events::GameEvent;
use crate::game::input::{parse_cell_value, InputEvent, Intent};
use crate::game::phase::Outcome;
use crate::game::render::{Color, Frame, GridLayout, TextAlign};
use crate::game::session::{Game, TickContext, TickResult};
use crate::games::{GameKind, TURN_TICK};

pub type Grid = [[Option<u8>; 9]; 9];

const GRID: GridLayout = GridLayout::new(Vec2::new(20.0, 50.0), 40.0, 9, 9);

/// The starter puzzle.
pub const PUZZLE: [[u8; 9]; 9] = [
    [5, 3, 0, 0, 7, 0, 0, 0, 0],
    [6, 0, 0, 1, 9, 5, 0, 0, 0],
    [0, 9, 8, 0, 0, 0, 0, 6, 0],
    [8, 0, 0, 0, 6, 0, 0, 0, 3],
    [4, 0, 0, 8, 0, 3, 0, 0, 1],
    [7, 0, 0, 0, 2, 0, 0, 0, 6],
    [0, 6, 0, 0, 0, 0, 2, 8, 0],
    [0, 0, 0, 4, 1, 9, 0, 0, 5],
    [0, 0, 0, 0, 8, 0, 0, 7, 9],
];

/// Expand a `0`-for-empty digit table into a grid.
pub fn grid_from_digits(digits: &[[u8; 9]; 9]) -> Grid {
    let mut grid = [[None; 9]; 9];
    for (r, row) in digits.iter().enumerate() {
        for (c, &d) in row.iter().enumerate() {
            grid[r][c] = (d != 0).then_some(d);
        }
    }
    grid
}

/// Whether `n` at (row, col) clashes with nothing else in its row, column or box.
pub fn is_valid_number(grid: &Grid, row: usize, col: usize, n: u8) -> bool {
    for x in 0..9 {
        if x != col && grid[row][x] == Some(n) {
            return false;
        }
        if x != row && grid[x][col] == Some(n) {
            return false;
        }
    }

    let box_row = row / 3 * 3;
    let box_col = col / 3 * 3;
    for r in box_row..box_row + 3 {
        for c in box_col..box_col + 3 {
            if (r, c) != (row, col) && grid[r][c] == Some(n) {
                return false;
            }
        }
    }

    true
}

/// No filled cell clashes with another.
pub fn validate_grid(grid: &Grid) -> bool {
    (0..9).all(|r| {
        (0..9).all(|c| match grid[r][c] {
            Some(n) => is_valid_number(grid, r, c, n),
            None => true,
        })
    })
}

/// Every cell filled and every row, column and box holds 1-9 exactly once.
pub fn is_complete(grid: &Grid) -> bool {
    grid.iter().all(|row| row.iter().all(Option::is_some)) && validate_grid(grid)
}

pub struct Sudoku {
    grid: Grid,
    givens: Grid,
    valid: bool,
    solved: bool,
}

impl Sudoku {
    pub fn new() -> Self {
        let givens = grid_from_digits(&PUZZLE);
        Self {
            grid: givens,
            givens,
            valid: true,
            solved: false,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn is_given(&self, row: usize, col: usize) -> bool {
        self.givens[row][col].is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Player-entered cells.
    fn filled(&self) -> u32 {
        let mut count = 0;
        for r in 0..9 {
            for c in 0..9 {
                if !self.is_given(r, c) && self.grid[r][c].is_some() {
                    count += 1;
                }
            }
        }
        count
    }
}

impl Default for Sudoku {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for Sudoku {
    fn kind(&self) -> GameKind {
        GameKind::Sudoku
    }

    fn tick_period(&self) -> Duration {
        TURN_TICK
    }

    fn reset(&mut self, _rng: &mut DeterministicRng) {
        self.grid = self.givens;
        self.valid = true;
        self.solved = false;
    }

    fn translate(&mut self, event: &InputEvent) -> Option<Intent> {
        let InputEvent::CellText { row, col, text } = event else {
            return None;
        };

        match parse_cell_value(text) {
            Ok(value) => Some(Intent::Enter { row: *row, col: *col, value }),
            Err(err) => {
                debug!(%err, "Cell input rejected");
                None
            }
        }
    }

    fn apply(&mut self, intent: Intent, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();

        let Intent::Enter { row, col, value } = intent else {
            return result;
        };
        let (row, col) = (row as usize, col as usize);
        if row > 8 || col > 8 || self.solved || self.is_given(row, col) {
            debug!(row, col, "Cell is locked");
            return result;
        }
        if matches!(value, Some(v) if !(1..=9).contains(&v)) {
            return result;
        }

        self.grid[row][col] = value;
        self.valid = validate_grid(&self.grid);
        result.push(GameEvent::score_changed(ctx.tick, self.filled()));

        if self.valid && is_complete(&self.grid) {
            self.solved = true;
            result.finish(Outcome::Won);
        }
        result
    }

    fn tick(&mut self, _ctx: &mut TickContext<'_>) -> TickResult {
        TickResult::none()
    }

    fn render(&self, frame: &mut Frame) {
        frame.clear(Color::WHITE);

        let status = if self.solved {
            "Puzzle complete"
        } else if !self.valid {
            "Invalid puzzle state"
        } else {
            "Fill each row, column and box with 1-9"
        };
        frame.hud(0, status, if self.valid { Color::BLACK } else { Color::RED });

        for r in 0..9u8 {
            for c in 0..9u8 {
                let rect = GRID.cell_rect(r, c);
                if self.is_given(r as usize, c as usize) {
                    frame.fill_rect(rect, Color::LIGHT_GRAY);
                }
                frame.stroke_rect(rect, Color::GRAY, 1.0);

                if let Some(n) = self.grid[r as usize][c as usize] {
                    let color = if self.is_given(r as usize, c as usize) { Color::BLACK } else { Color::BLUE };
                    let mut pos = GRID.cell_center(r, c);
                    pos.y += 8.0;
                    frame.text(pos, n.to_string(), 22.0, color, TextAlign::Center);
                }
            }
        }

        // Heavy box borders
        for b in 0..3u8 {
            for d in 0..3u8 {
                let origin = GRID.cell_rect(b * 3, d * 3);
                let side = GRID.cell * 3.0;
                frame.stroke_rect(Rect::new(origin.x, origin.y, side, side), Color::BLACK, 2.0);
            }
        }
    }

    fn canvas_size(&self) -> (f32, f32) {
        GRID.canvas_size()
    }

    fn score(&self) -> u32 {
        self.filled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SOLUTION: [[u8; 9]; 9] = [
        [5, 3, 4, 6, 7, 8, 9, 1, 2],
        [6, 7, 2, 1, 9, 5, 3, 4, 8],
        [1, 9, 8, 3, 4, 2, 5, 6, 7],
        [8, 5, 9, 7, 6, 1, 4, 2, 3],
        [4, 2, 6, 8, 5, 3, 7, 9, 1],
        [7, 1, 3, 9, 2, 4, 8, 5, 6],
        [9, 6, 1, 5, 3, 7, 2, 8, 4],
        [2, 8, 7, 4, 1, 9, 6, 3, 5],
        [3, 4, 5, 2, 8, 6, 1, 7, 9],
    ];

    fn enter(game: &mut Sudoku, row: u8, col: u8, value: Option<u8>) -> TickResult {
        let mut rng = DeterministicRng::new(0);
        game.apply(Intent::Enter { row, col, value }, &mut TickContext { tick: 1, rng: &mut rng })
    }

    #[test]
    fn test_puzzle_is_valid_and_incomplete() {
        let grid = grid_from_digits(&PUZZLE);
        assert!(validate_grid(&grid));
        assert!(!is_complete(&grid));
    }

    #[test]
    fn test_solution_is_complete() {
        assert!(is_complete(&grid_from_digits(&SOLUTION)));
    }

    #[test]
    fn test_is_valid_number() {
        let grid = grid_from_digits(&PUZZLE);
        // 5 already in row 0
        assert!(!is_valid_number(&grid, 0, 2, 5));
        // 8 in column 2 (row 2)
        assert!(!is_valid_number(&grid, 0, 2, 8));
        // 9 in the top-left box
        assert!(!is_valid_number(&grid, 1, 1, 9));
        assert!(is_valid_number(&grid, 0, 2, 4));
        // A cell never clashes with itself
        assert!(is_valid_number(&grid, 0, 0, 5));
    }

    #[test]
    fn test_givens_are_locked() {
        let mut game = Sudoku::new();
        enter(&mut game, 0, 0, Some(1));
        assert_eq!(game.grid()[0][0], Some(5));
    }

    #[test]
    fn test_text_boundary() {
        let mut game = Sudoku::new();
        let bad = InputEvent::CellText { row: 0, col: 2, text: "12".into() };
        assert_eq!(game.translate(&bad), None);

        let clear = InputEvent::CellText { row: 0, col: 2, text: "".into() };
        assert_eq!(game.translate(&clear), Some(Intent::Enter { row: 0, col: 2, value: None }));
    }

    #[test]
    fn test_conflict_marks_invalid_then_clears() {
        let mut game = Sudoku::new();
        enter(&mut game, 0, 2, Some(5));
        assert!(!game.is_valid());

        enter(&mut game, 0, 2, None);
        assert!(game.is_valid());
    }

    #[test]
    fn test_solving_wins() {
        let mut game = Sudoku::new();
        let mut last = TickResult::none();
        for r in 0..9u8 {
            for c in 0..9u8 {
                if !game.is_given(r as usize, c as usize) {
                    last = enter(&mut game, r, c, Some(SOLUTION[r as usize][c as usize]));
                }
            }
        }
        assert_eq!(last.outcome, Some(Outcome::Won));
        assert_eq!(game.score(), 51);
    }

    #[test]
    fn test_reset_restores_givens() {
        let mut game = Sudoku::new();
        enter(&mut game, 0, 2, Some(4));
        game.reset(&mut DeterministicRng::new(0));
        assert_eq!(game.grid(), &grid_from_digits(&PUZZLE));
        assert_eq!(game.score(), 0);
    }

    /// Relabelling digits of a solution keeps it a solution.
    fn relabel(perm: &[u8]) -> Grid {
        let mut digits = SOLUTION;
        for row in digits.iter_mut() {
            for d in row.iter_mut() {
                *d = perm[(*d - 1) as usize];
            }
        }
        grid_from_digits(&digits)
    }

    proptest! {
        #[test]
        fn prop_relabelled_solution_complete(
            perm in Just((1..=9u8).collect::<Vec<_>>()).prop_shuffle(),
        ) {
            prop_assert!(is_complete(&relabel(&perm)));
        }

        #[test]
        fn prop_changed_cell_breaks_completeness(
            perm in Just((1..=9u8).collect::<Vec<_>>()).prop_shuffle(),
            row in 0usize..9,
            col in 0usize..9,
            bump in 1u8..9,
        ) {
            let mut grid = relabel(&perm);
            let old = grid[row][col].unwrap_or(1);
            let new = (old - 1 + bump) % 9 + 1;
            grid[row][col] = Some(new);

            prop_assert!(!is_complete(&grid));
            prop_assert!(!is_valid_number(&grid, row, col, new));
        }

        #[test]
        fn prop_duplicate_in_unit_rejected(
            row in 0usize..9,
            col in 0usize..9,
            other in 0usize..9,
            unit in 0u8..3,
        ) {
            let grid = grid_from_digits(&SOLUTION);
            let (r, c) = match unit {
                0 => (row, other),
                1 => (other, col),
                _ => (row / 3 * 3 + other / 3, col / 3 * 3 + other % 3),
            };
            prop_assume!((r, c) != (row, col));

            let n = grid[r][c].unwrap_or(1);
            prop_assert!(!is_valid_number(&grid, row, col, n));
        }
    }
}
