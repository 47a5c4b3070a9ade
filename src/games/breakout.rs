//! Breakout
//!
//! Sixty blocks in six rows sit above a pointer-driven paddle. The ball
//! reflects off the side and top walls, the paddle (with spin depending on
//! where it lands) and blocks, destroying every block it touches for ten
//! points each. Losing the ball costs a life; the next ball is served after
//! about a second. Clearing every block wins; losing all three lives ends
//! the game.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::{Rect, Vec2};
use crate::game::collision::{paddle_spin, rects_touch};
use crate::game::events::GameEvent;
use crate::game::input::{center_paddle, InputEvent, Intent, Key};
use crate::game::phase::Outcome;
use crate::game::render::{Color, Frame, TextAlign};
use crate::game::session::{Game, TickContext, TickResult};
use crate::games::{GameKind, ARCADE_TICK};

pub const WIDTH: f32 = 600.0;
pub const HEIGHT: f32 = 400.0;
pub const PADDLE_WIDTH: f32 = 100.0;
pub const PADDLE_HEIGHT: f32 = 15.0;
pub const PADDLE_Y: f32 = HEIGHT - 30.0;
pub const BALL_SIZE: f32 = 10.0;
pub const BLOCK_WIDTH: f32 = 50.0;
pub const BLOCK_HEIGHT: f32 = 20.0;
pub const BLOCK_ROWS: usize = 6;
pub const BLOCK_COLS: usize = 10;
pub const BLOCK_POINTS: u32 = 10;
pub const LIVES: u32 = 3;
/// Ticks between losing a ball and serving the next (~1 s).
pub const RESPAWN_TICKS: u32 = 62;
pub const KEY_STEP: f32 = 25.0;

const SERVE_POS: Vec2 = Vec2::new(WIDTH / 2.0, HEIGHT - 50.0);

const ROW_COLORS: [Color; BLOCK_ROWS] = [
    Color::rgb(0xff, 0x6b, 0x6b),
    Color::rgb(0x4e, 0xcd, 0xc4),
    Color::rgb(0x45, 0xb7, 0xd1),
    Color::rgb(0x96, 0xce, 0xb4),
    Color::rgb(0xfe, 0xca, 0x57),
    Color::rgb(0xff, 0x9f, 0xf3),
];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub rect: Rect,
    pub row: usize,
    pub destroyed: bool,
}

/// The full wall, row by row.
pub fn create_blocks() -> Vec<Block> {
    let mut blocks = Vec::with_capacity(BLOCK_ROWS * BLOCK_COLS);
    for row in 0..BLOCK_ROWS {
        for col in 0..BLOCK_COLS {
            blocks.push(Block {
                rect: Rect::new(
                    col as f32 * (BLOCK_WIDTH + 5.0) + 30.0,
                    row as f32 * (BLOCK_HEIGHT + 5.0) + 50.0,
                    BLOCK_WIDTH,
                    BLOCK_HEIGHT,
                ),
                row,
                destroyed: false,
            });
        }
    }
    blocks
}

/// Where the ball is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Ball {
    InPlay { pos: Vec2, velocity: Vec2 },
    /// Lost; the next serve happens when the countdown reaches zero
    Respawning { ticks: u32 },
}

pub struct Breakout {
    paddle_x: f32,
    ball: Ball,
    blocks: Vec<Block>,
    score: u32,
    lives: u32,
}

impl Breakout {
    pub fn new() -> Self {
        Self {
            paddle_x: WIDTH / 2.0 - PADDLE_WIDTH / 2.0,
            ball: Ball::InPlay {
                pos: SERVE_POS,
                velocity: Vec2::new(5.0, -5.0),
            },
            blocks: create_blocks(),
            score: 0,
            lives: LIVES,
        }
    }

    pub fn paddle(&self) -> Rect {
        Rect::new(self.paddle_x, PADDLE_Y, PADDLE_WIDTH, PADDLE_HEIGHT)
    }

    pub fn ball(&self) -> Ball {
        self.ball
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Mutable wall, for scripted scenarios.
    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn remaining_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| !b.destroyed).count()
    }

    /// Put the ball somewhere specific, e.g. for scripted play.
    pub fn place_ball(&mut self, pos: Vec2, velocity: Vec2) {
        self.ball = Ball::InPlay { pos, velocity };
    }

    fn serve(rng: &mut DeterministicRng) -> Ball {
        Ball::InPlay {
            pos: SERVE_POS,
            velocity: Vec2::new(5.0 * rng.next_sign(), -5.0),
        }
    }

    fn lose_ball(&mut self, tick: u32, result: &mut TickResult) {
        self.lives = self.lives.saturating_sub(1);
        result.push(GameEvent::life_lost(tick, self.lives));

        if self.lives == 0 {
            self.ball = Ball::Respawning { ticks: 0 };
            result.finish(Outcome::Over);
        } else {
            self.ball = Ball::Respawning { ticks: RESPAWN_TICKS };
        }
    }
}

impl Default for Breakout {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for Breakout {
    fn kind(&self) -> GameKind {
        GameKind::Breakout
    }

    fn tick_period(&self) -> Duration {
        ARCADE_TICK
    }

    fn reset(&mut self, rng: &mut DeterministicRng) {
        *self = Breakout::new();
        self.ball = Self::serve(rng);
    }

    fn translate(&mut self, event: &InputEvent) -> Option<Intent> {
        let position = match *event {
            InputEvent::PointerMove { x, .. } | InputEvent::TouchMove { x, .. } => {
                center_paddle(x, PADDLE_WIDTH, WIDTH)
            }
            InputEvent::KeyDown { key: Key::ArrowLeft | Key::A } => self.paddle_x - KEY_STEP,
            InputEvent::KeyDown { key: Key::ArrowRight | Key::D } => self.paddle_x + KEY_STEP,
            _ => return None,
        };
        Some(Intent::PaddleTo { position })
    }

    fn apply(&mut self, intent: Intent, _ctx: &mut TickContext<'_>) -> TickResult {
        if let Intent::PaddleTo { position } = intent {
            self.paddle_x = position.clamp(0.0, WIDTH - PADDLE_WIDTH);
        }
        TickResult::none()
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();

        let (mut pos, mut velocity) = match self.ball {
            Ball::InPlay { pos, velocity } => (pos, velocity),
            Ball::Respawning { ticks } if ticks > 1 => {
                self.ball = Ball::Respawning { ticks: ticks - 1 };
                return result;
            }
            Ball::Respawning { .. } => {
                self.ball = Self::serve(ctx.rng);
                return result;
            }
        };

        pos = pos + velocity;

        if pos.y >= HEIGHT {
            self.lose_ball(ctx.tick, &mut result);
            return result;
        }

        // Side and top walls
        if pos.x <= 0.0 || pos.x >= WIDTH - BALL_SIZE {
            velocity.x = -velocity.x;
            pos.x = pos.x.clamp(0.0, WIDTH - BALL_SIZE);
        }
        if pos.y <= 0.0 {
            velocity.y = -velocity.y;
            pos.y = 0.0;
        }

        let ball_rect = Rect::square(pos, BALL_SIZE);

        let paddle = self.paddle();
        if rects_touch(&ball_rect, &paddle) {
            velocity.y = -velocity.y.abs();
            velocity.x = paddle_spin(pos.x, paddle.x, PADDLE_WIDTH);
        }

        let mut hit = false;
        for block in self.blocks.iter_mut().filter(|b| !b.destroyed) {
            if rects_touch(&ball_rect, &block.rect) {
                block.destroyed = true;
                hit = true;
                self.score += BLOCK_POINTS;
            }
        }
        if hit {
            velocity.y = -velocity.y;
            result.push(GameEvent::score_changed(ctx.tick, self.score));
        }

        self.ball = Ball::InPlay { pos, velocity };

        if self.remaining_blocks() == 0 {
            result.finish(Outcome::Won);
        }
        result
    }

    fn render(&self, frame: &mut Frame) {
        frame.clear(Color::rgb(15, 23, 42));

        for block in self.blocks.iter().filter(|b| !b.destroyed) {
            frame.fill_rect(block.rect, ROW_COLORS[block.row % BLOCK_ROWS]);
        }

        frame.fill_rect(self.paddle(), Color::BLUE);
        if let Ball::InPlay { pos, .. } = self.ball {
            frame.fill_rect(Rect::square(pos, BALL_SIZE), Color::WHITE);
        }

        frame.hud(0, format!("Score: {}", self.score), Color::WHITE);
        frame.text(
            Vec2::new(WIDTH - 10.0, 24.0),
            format!("Lives: {}", self.lives),
            20.0,
            Color::WHITE,
            TextAlign::Right,
        );
    }

    fn canvas_size(&self) -> (f32, f32) {
        (WIDTH, HEIGHT)
    }

    fn score(&self) -> u32 {
        self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Breakout, DeterministicRng) {
        let mut rng = DeterministicRng::new(17);
        let mut game = Breakout::new();
        game.reset(&mut rng);
        (game, rng)
    }

    fn step(game: &mut Breakout, rng: &mut DeterministicRng) -> TickResult {
        game.tick(&mut TickContext { tick: 1, rng })
    }

    #[test]
    fn test_block_layout() {
        let blocks = create_blocks();
        assert_eq!(blocks.len(), 60);
        assert_eq!(blocks[0].rect, Rect::new(30.0, 50.0, 50.0, 20.0));
        assert_eq!(blocks[59].rect, Rect::new(525.0, 175.0, 50.0, 20.0));
        assert!(blocks.iter().all(|b| b.rect.is_within(WIDTH, HEIGHT)));
    }

    #[test]
    fn test_serve() {
        let (game, _) = fresh();
        match game.ball() {
            Ball::InPlay { pos, velocity } => {
                assert_eq!(pos, SERVE_POS);
                assert_eq!(velocity.x.abs(), 5.0);
                assert_eq!(velocity.y, -5.0);
            }
            other => panic!("unexpected ball {other:?}"),
        }
    }

    #[test]
    fn test_block_hit_scores_and_reflects() {
        let (mut game, mut rng) = fresh();
        // Just under the first block of the bottom row, moving up
        game.place_ball(Vec2::new(50.0, 200.0), Vec2::new(0.0, -5.0));

        let result = step(&mut game, &mut rng);
        assert!(game.blocks()[50].destroyed);
        assert_eq!(game.remaining_blocks(), 59);
        assert_eq!(game.score(), 10);
        assert!(matches!(game.ball(), Ball::InPlay { velocity, .. } if velocity.y == 5.0));
        assert_eq!(result.outcome, None);
    }

    #[test]
    fn test_paddle_bounce() {
        let (mut game, mut rng) = fresh();
        game.paddle_x = 250.0;
        game.place_ball(Vec2::new(295.0, 358.0), Vec2::new(0.0, 5.0));

        step(&mut game, &mut rng);
        match game.ball() {
            Ball::InPlay { velocity, .. } => {
                assert_eq!(velocity.y, -5.0);
                assert!(velocity.x.abs() < 1.0);
            }
            other => panic!("unexpected ball {other:?}"),
        }
    }

    #[test]
    fn test_side_wall_bounce() {
        let (mut game, mut rng) = fresh();
        game.place_ball(Vec2::new(2.0, 300.0), Vec2::new(-5.0, -5.0));
        step(&mut game, &mut rng);
        assert!(matches!(game.ball(), Ball::InPlay { pos, velocity } if velocity.x == 5.0 && pos.x == 0.0));
    }

    #[test]
    fn test_lost_ball_respawns() {
        let (mut game, mut rng) = fresh();
        game.paddle_x = 0.0;
        game.place_ball(Vec2::new(500.0, 398.0), Vec2::new(0.0, 5.0));

        let result = step(&mut game, &mut rng);
        assert_eq!(game.lives(), 2);
        assert_eq!(result.events, vec![GameEvent::life_lost(1, 2)]);
        assert_eq!(game.ball(), Ball::Respawning { ticks: RESPAWN_TICKS });

        for _ in 0..RESPAWN_TICKS {
            step(&mut game, &mut rng);
        }
        assert!(matches!(game.ball(), Ball::InPlay { pos, .. } if pos == SERVE_POS));
    }

    #[test]
    fn test_last_life_ends_game() {
        let (mut game, mut rng) = fresh();
        game.lives = 1;
        game.paddle_x = 0.0;
        game.place_ball(Vec2::new(500.0, 398.0), Vec2::new(0.0, 5.0));

        assert_eq!(step(&mut game, &mut rng).outcome, Some(Outcome::Over));
        assert_eq!(game.lives(), 0);
    }

    #[test]
    fn test_clearing_wall_wins() {
        let (mut game, mut rng) = fresh();
        for (i, block) in game.blocks.iter_mut().enumerate() {
            block.destroyed = i != 50;
        }
        game.place_ball(Vec2::new(50.0, 200.0), Vec2::new(0.0, -5.0));

        let result = step(&mut game, &mut rng);
        assert_eq!(result.outcome, Some(Outcome::Won));
        assert_eq!(game.remaining_blocks(), 0);
    }

    #[test]
    fn test_pointer_moves_paddle() {
        let (mut game, mut rng) = fresh();
        let intent = game.translate(&InputEvent::PointerMove { x: 590.0, y: 0.0 }).unwrap();
        game.apply(intent, &mut TickContext { tick: 0, rng: &mut rng });
        assert_eq!(game.paddle().x, WIDTH - PADDLE_WIDTH);
    }
}
