//! Chess
//!
//! Standard starting position, white moves first, pieces move by clicking
//! a piece then a target square. Movement follows each piece's basic
//! pattern; sliding pieces are blocked by anything in their path. There is
//! no check, castling, en passant or promotion: the game ends when a king
//! is captured, or when the side to move has no legal move at all.
//!
//! In computer mode the CPU plays black with a uniformly random legal move.

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

/// Ticks the CPU waits before moving.
pub const CPU_DELAY_TICKS: u32 = 5;

const GRID: GridLayout = GridLayout::new(Vec2::new(20.0, 50.0), 60.0, 8, 8);

// =============================================================================
// PIECES AND BOARD
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceType {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
}

impl PieceType {
    /// Material value used for scoring captures.
    pub fn value(self) -> u32 {
        match self {
            PieceType::King => 0,
            PieceType::Queen => 9,
            PieceType::Rook => 5,
            PieceType::Bishop | PieceType::Knight => 3,
            PieceType::Pawn => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Row step of this side's pawns.
    fn forward(self) -> i8 {
        match self {
            Side::White => -1,
            Side::Black => 1,
        }
    }

    fn pawn_row(self) -> i8 {
        match self {
            Side::White => 6,
            Side::Black => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceType,
    pub side: Side,
}

impl Piece {
    pub const fn new(kind: PieceType, side: Side) -> Self {
        Self { kind, side }
    }

    pub fn symbol(self) -> char {
        match (self.side, self.kind) {
            (Side::White, PieceType::King) => '♔',
            (Side::White, PieceType::Queen) => '♕',
            (Side::White, PieceType::Rook) => '♖',
            (Side::White, PieceType::Bishop) => '♗',
            (Side::White, PieceType::Knight) => '♘',
            (Side::White, PieceType::Pawn) => '♙',
            (Side::Black, PieceType::King) => '♚',
            (Side::Black, PieceType::Queen) => '♛',
            (Side::Black, PieceType::Rook) => '♜',
            (Side::Black, PieceType::Bishop) => '♝',
            (Side::Black, PieceType::Knight) => '♞',
            (Side::Black, PieceType::Pawn) => '♟',
        }
    }
}

/// `(row, col)`, row 0 is black's back rank.
pub type Square = (u8, u8);

pub type Board = [[Option<Piece>; 8]; 8];

/// Algebraic name of a square, e.g. `(6, 4)` is `e2`.
pub fn square_name((row, col): Square) -> String {
    format!("{}{}", (b'a' + col) as char, 8 - row)
}

pub fn initial_board() -> Board {
    use PieceType::*;
    const BACK_RANK: [PieceType; 8] = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];

    let mut board: Board = [[None; 8]; 8];
    for col in 0..8 {
        board[0][col] = Some(Piece::new(BACK_RANK[col], Side::Black));
        board[1][col] = Some(Piece::new(Pawn, Side::Black));
        board[6][col] = Some(Piece::new(Pawn, Side::White));
        board[7][col] = Some(Piece::new(BACK_RANK[col], Side::White));
    }
    board
}

// =============================================================================
// MOVE RULES
// =============================================================================

fn at(board: &Board, (row, col): Square) -> Option<Piece> {
    board.get(row as usize)?.get(col as usize).copied().flatten()
}

/// No piece between `from` and `to` along a straight or diagonal line.
fn path_clear(board: &Board, from: Square, to: Square) -> bool {
    let dr = (to.0 as i8 - from.0 as i8).signum();
    let dc = (to.1 as i8 - from.1 as i8).signum();
    let (mut r, mut c) = (from.0 as i8 + dr, from.1 as i8 + dc);

    while (r, c) != (to.0 as i8, to.1 as i8) {
        if at(board, (r as u8, c as u8)).is_some() {
            return false;
        }
        r += dr;
        c += dc;
    }
    true
}

/// Whether the piece on `from` may move to `to` when it is `turn`'s move.
pub fn is_valid_move(board: &Board, turn: Side, from: Square, to: Square) -> bool {
    if from.0 > 7 || from.1 > 7 || to.0 > 7 || to.1 > 7 || from == to {
        return false;
    }
    let Some(piece) = at(board, from) else {
        return false;
    };
    if piece.side != turn {
        return false;
    }

    let target = at(board, to);
    if target.is_some_and(|t| t.side == piece.side) {
        return false;
    }

    let row_step = to.0 as i8 - from.0 as i8;
    let col_diff = (to.1 as i8 - from.1 as i8).abs();
    let row_diff = row_step.abs();

    match piece.kind {
        PieceType::Pawn => {
            let forward = piece.side.forward();
            if col_diff == 0 && target.is_none() {
                if row_step == forward {
                    return true;
                }
                from.0 as i8 == piece.side.pawn_row()
                    && row_step == 2 * forward
                    && path_clear(board, from, to)
            } else {
                col_diff == 1 && row_step == forward && target.is_some()
            }
        }
        PieceType::Rook => (row_diff == 0 || col_diff == 0) && path_clear(board, from, to),
        PieceType::Bishop => row_diff == col_diff && path_clear(board, from, to),
        PieceType::Queen => {
            (row_diff == col_diff || row_diff == 0 || col_diff == 0) && path_clear(board, from, to)
        }
        PieceType::King => row_diff <= 1 && col_diff <= 1,
        PieceType::Knight => (row_diff == 2 && col_diff == 1) || (row_diff == 1 && col_diff == 2),
    }
}

/// Every legal target for the piece on `from`.
pub fn possible_moves(board: &Board, turn: Side, from: Square) -> Vec<Square> {
    let mut moves = Vec::new();
    for row in 0..8 {
        for col in 0..8 {
            if is_valid_move(board, turn, from, (row, col)) {
                moves.push((row, col));
            }
        }
    }
    moves
}

/// Every legal `(from, to)` for `side`.
pub fn all_moves(board: &Board, side: Side) -> Vec<(Square, Square)> {
    let mut moves = Vec::new();
    for row in 0..8 {
        for col in 0..8 {
            if at(board, (row, col)).is_some_and(|p| p.side == side) {
                for to in possible_moves(board, side, (row, col)) {
                    moves.push(((row, col), to));
                }
            }
        }
    }
    moves
}

// =============================================================================
// GAME
// =============================================================================

pub struct Chess {
    opponent: Opponent,
    board: Board,
    turn: Side,
    selected: Option<Square>,
    possible: Vec<Square>,
    winner: Option<Side>,
    cpu_timer: Option<u32>,
    /// Material captured by white
    material: u32,
}

impl Chess {
    pub fn new(opponent: Opponent) -> Self {
        Self {
            opponent,
            board: initial_board(),
            turn: Side::White,
            selected: None,
            possible: Vec::new(),
            winner: None,
            cpu_timer: None,
            material: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn selected(&self) -> Option<Square> {
        self.selected
    }

    pub fn possible(&self) -> &[Square] {
        &self.possible
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    fn cpu_turn(&self) -> bool {
        self.opponent == Opponent::Computer && self.turn == Side::Black
    }

    fn select(&mut self, square: Option<Square>) {
        self.selected = square;
        self.possible = match square {
            Some(sq) => possible_moves(&self.board, self.turn, sq),
            None => Vec::new(),
        };
    }

    /// Handle a click on `square` for the side to move.
    fn click(&mut self, square: Square, tick: u32, result: &mut TickResult) {
        match self.selected {
            Some(from) if from == square => self.select(None),
            Some(from) if is_valid_move(&self.board, self.turn, from, square) => {
                self.play(from, square, tick, result);
            }
            _ => {
                let own = at(&self.board, square).is_some_and(|p| p.side == self.turn);
                if own {
                    self.select(Some(square));
                } else {
                    if self.selected.is_none() {
                        debug!(square = %square_name(square), "Nothing to select");
                    }
                    self.select(None);
                }
            }
        }
    }

    fn play(&mut self, from: Square, to: Square, tick: u32, result: &mut TickResult) {
        let moving = at(&self.board, from);
        let captured = at(&self.board, to);
        self.board[to.0 as usize][to.1 as usize] = moving;
        self.board[from.0 as usize][from.1 as usize] = None;
        self.select(None);

        let actor = if self.cpu_turn() {
            Actor::Computer(0)
        } else {
            Actor::Human(if self.turn == Side::White { 0 } else { 1 })
        };
        let sep = if captured.is_some() { "x" } else { "-" };
        result.push(GameEvent::move_played(
            tick,
            actor,
            format!("{}{}{}", square_name(from), sep, square_name(to)),
        ));

        if let Some(piece) = captured {
            if self.turn == Side::White {
                self.material += piece.kind.value();
                result.push(GameEvent::score_changed(tick, self.material));
            }
            if piece.kind == PieceType::King {
                self.finish(self.turn, result);
                return;
            }
        }

        self.turn = self.turn.other();
        if all_moves(&self.board, self.turn).is_empty() {
            self.finish(self.turn.other(), result);
            return;
        }
        if self.cpu_turn() {
            self.cpu_timer = Some(CPU_DELAY_TICKS);
        }
    }

    fn finish(&mut self, winner: Side, result: &mut TickResult) {
        self.winner = Some(winner);
        self.cpu_timer = None;
        let outcome = match (self.opponent, winner) {
            (Opponent::Computer, Side::Black) => Outcome::Over,
            _ => Outcome::Won,
        };
        result.finish(outcome);
    }
}

impl Game for Chess {
    fn kind(&self) -> GameKind {
        GameKind::Chess
    }

    fn tick_period(&self) -> Duration {
        TURN_TICK
    }

    fn reset(&mut self, _rng: &mut DeterministicRng) {
        *self = Chess::new(self.opponent);
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
        if row > 7 || col > 7 || self.winner.is_some() || self.cpu_turn() {
            debug!(row, col, "Click ignored");
            return result;
        }

        self.click((row, col), ctx.tick, &mut result);
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

        let moves = all_moves(&self.board, self.turn);
        if let Some(&(from, to)) = ctx.rng.choose(&moves) {
            self.play(from, to, ctx.tick, &mut result);
        }
        result
    }

    fn render(&self, frame: &mut Frame) {
        frame.clear(Color::rgb(0x1f, 0x29, 0x37));

        let status = match self.winner {
            Some(Side::White) => "White wins".to_string(),
            Some(Side::Black) => "Black wins".to_string(),
            None => format!("{:?} to move", self.turn),
        };
        frame.hud(0, status, Color::WHITE);

        let light = Color::rgb(0xfe, 0xf3, 0xc7);
        let dark = Color::rgb(0x92, 0x40, 0x0e);

        for row in 0..8u8 {
            for col in 0..8u8 {
                let rect = GRID.cell_rect(row, col);
                let color = if self.selected == Some((row, col)) {
                    Color::YELLOW
                } else if (row + col) % 2 == 0 {
                    light
                } else {
                    dark
                };
                frame.fill_rect(rect, color);

                if self.possible.contains(&(row, col)) {
                    frame.fill_circle(GRID.cell_center(row, col), 8.0, Color::GREEN);
                }

                if let Some(piece) = self.board[row as usize][col as usize] {
                    let mut pos = GRID.cell_center(row, col);
                    pos.y += 16.0;
                    frame.text(pos, piece.symbol().to_string(), 44.0, Color::BLACK, TextAlign::Center);
                }
            }
        }
    }

    fn canvas_size(&self) -> (f32, f32) {
        GRID.canvas_size()
    }

    fn score(&self) -> u32 {
        self.material
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(game: &mut Chess, row: u8, col: u8) -> TickResult {
        let mut rng = DeterministicRng::new(0);
        game.apply(Intent::Select { row, col }, &mut TickContext { tick: 1, rng: &mut rng })
    }

    #[test]
    fn test_initial_board() {
        let board = initial_board();
        assert_eq!(board[7][4], Some(Piece::new(PieceType::King, Side::White)));
        assert_eq!(board[0][3], Some(Piece::new(PieceType::Queen, Side::Black)));
        assert!(board[3].iter().all(Option::is_none));
        assert_eq!(square_name((6, 4)), "e2");
    }

    #[test]
    fn test_pawn_moves() {
        let board = initial_board();
        let moves = possible_moves(&board, Side::White, (6, 4));
        assert_eq!(moves, vec![(4, 4), (5, 4)]);

        // Not black's pawns on white's turn
        assert!(possible_moves(&board, Side::White, (1, 4)).is_empty());
        assert_eq!(possible_moves(&board, Side::Black, (1, 4)), vec![(2, 4), (3, 4)]);
    }

    #[test]
    fn test_pawn_capture_only_diagonal() {
        let mut board: Board = [[None; 8]; 8];
        board[4][4] = Some(Piece::new(PieceType::Pawn, Side::White));
        board[3][4] = Some(Piece::new(PieceType::Pawn, Side::Black));
        board[3][5] = Some(Piece::new(PieceType::Knight, Side::Black));

        assert!(!is_valid_move(&board, Side::White, (4, 4), (3, 4)));
        assert!(is_valid_move(&board, Side::White, (4, 4), (3, 5)));
        assert!(!is_valid_move(&board, Side::White, (4, 4), (3, 3)));
    }

    #[test]
    fn test_sliders_blocked() {
        let board = initial_board();
        // Rook and bishop boxed in at the start
        assert!(possible_moves(&board, Side::White, (7, 0)).is_empty());
        assert!(possible_moves(&board, Side::White, (7, 2)).is_empty());
        // Knight jumps
        assert_eq!(possible_moves(&board, Side::White, (7, 1)), vec![(5, 0), (5, 2)]);
    }

    #[test]
    fn test_no_own_capture() {
        let board = initial_board();
        assert!(!is_valid_move(&board, Side::White, (7, 4), (6, 4)));
    }

    #[test]
    fn test_white_opening_has_twenty_moves() {
        assert_eq!(all_moves(&initial_board(), Side::White).len(), 20);
    }

    #[test]
    fn test_select_move_and_turn_passes() {
        let mut game = Chess::new(Opponent::Local);
        click(&mut game, 6, 4);
        assert_eq!(game.selected(), Some((6, 4)));
        assert_eq!(game.possible().len(), 2);

        let result = click(&mut game, 4, 4);
        assert_eq!(game.board()[4][4], Some(Piece::new(PieceType::Pawn, Side::White)));
        assert_eq!(game.board()[6][4], None);
        assert_eq!(game.turn(), Side::Black);
        assert!(result.events.iter().any(|e| matches!(
            &e.data,
            crate::game::events::GameEventData::MovePlayed { notation, .. } if notation == "e2-e4"
        )));
    }

    #[test]
    fn test_deselect_and_reselect() {
        let mut game = Chess::new(Opponent::Local);
        click(&mut game, 6, 4);
        click(&mut game, 6, 4);
        assert_eq!(game.selected(), None);

        click(&mut game, 6, 4);
        click(&mut game, 6, 3);
        assert_eq!(game.selected(), Some((6, 3)));

        // Invalid target clears selection
        click(&mut game, 2, 2);
        assert_eq!(game.selected(), None);
        assert_eq!(game.turn(), Side::White);
    }

    #[test]
    fn test_king_capture_ends_game() {
        let mut game = Chess::new(Opponent::Local);
        game.board = [[None; 8]; 8];
        game.board[7][4] = Some(Piece::new(PieceType::King, Side::White));
        game.board[0][4] = Some(Piece::new(PieceType::King, Side::Black));
        game.board[4][4] = Some(Piece::new(PieceType::Rook, Side::White));

        click(&mut game, 4, 4);
        let result = click(&mut game, 0, 4);

        assert_eq!(result.outcome, Some(Outcome::Won));
        assert_eq!(game.winner(), Some(Side::White));
    }

    #[test]
    fn test_cpu_plays_black() {
        let mut game = Chess::new(Opponent::Computer);
        let mut rng = DeterministicRng::new(5);
        click(&mut game, 6, 4);
        click(&mut game, 4, 4);
        assert_eq!(game.turn(), Side::Black);

        // Clicks ignored on the CPU's turn
        click(&mut game, 1, 0);
        assert_eq!(game.selected(), None);

        for _ in 0..CPU_DELAY_TICKS {
            game.tick(&mut TickContext { tick: 2, rng: &mut rng });
        }
        assert_eq!(game.turn(), Side::White);
        let black_pieces_home = game.board()[0..2]
            .iter()
            .flat_map(|r| r.iter())
            .filter(|p| p.is_some())
            .count();
        assert_eq!(black_pieces_home, 15);
    }
}
