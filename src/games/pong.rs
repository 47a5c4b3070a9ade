//! Pong
//!
//! Player paddle on the left follows the pointer; the AI paddle on the
//! right tracks the ball centre at a fixed speed with a small dead zone.
//! A ball past the left edge scores for the AI, past the right edge for
//! the player. First to five points ends the game.

use std::time::Duration;

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
pub const HEIGHT: f32 = 300.0;
pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 60.0;
pub const BALL_SIZE: f32 = 10.0;
pub const PLAYER_X: f32 = 20.0;
pub const AI_X: f32 = WIDTH - 30.0;
pub const AI_SPEED: f32 = 4.0;
pub const AI_DEAD_ZONE: f32 = 5.0;
pub const WINNING_SCORE: u32 = 5;
/// Paddle step for keyboard control.
pub const KEY_STEP: f32 = 20.0;

const PADDLE_START_Y: f32 = HEIGHT / 2.0 - PADDLE_HEIGHT / 2.0;
const CENTER: Vec2 = Vec2::new(WIDTH / 2.0, HEIGHT / 2.0);

pub struct Pong {
    ball: Vec2,
    velocity: Vec2,
    player_y: f32,
    ai_y: f32,
    player_score: u32,
    ai_score: u32,
}

impl Pong {
    pub fn new() -> Self {
        Self {
            ball: CENTER,
            velocity: Vec2::new(5.0, 3.0),
            player_y: PADDLE_START_Y,
            ai_y: PADDLE_START_Y,
            player_score: 0,
            ai_score: 0,
        }
    }

    pub fn ball(&self) -> Vec2 {
        self.ball
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn scores(&self) -> (u32, u32) {
        (self.player_score, self.ai_score)
    }

    pub fn player_paddle(&self) -> Rect {
        Rect::new(PLAYER_X, self.player_y, PADDLE_WIDTH, PADDLE_HEIGHT)
    }

    pub fn ai_paddle(&self) -> Rect {
        Rect::new(AI_X, self.ai_y, PADDLE_WIDTH, PADDLE_HEIGHT)
    }

    fn serve(&mut self, rng: &mut DeterministicRng) {
        self.ball = CENTER;
        self.velocity = Vec2::new(5.0 * rng.next_sign(), 3.0 * rng.next_sign());
    }

    fn track_ball(&mut self) {
        let ball_center = self.ball.y + BALL_SIZE / 2.0;
        let paddle_center = self.ai_y + PADDLE_HEIGHT / 2.0;

        if ball_center < paddle_center - AI_DEAD_ZONE {
            self.ai_y = (self.ai_y - AI_SPEED).max(0.0);
        } else if ball_center > paddle_center + AI_DEAD_ZONE {
            self.ai_y = (self.ai_y + AI_SPEED).min(HEIGHT - PADDLE_HEIGHT);
        }
    }
}

impl Default for Pong {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for Pong {
    fn kind(&self) -> GameKind {
        GameKind::Pong
    }

    fn tick_period(&self) -> Duration {
        ARCADE_TICK
    }

    fn reset(&mut self, rng: &mut DeterministicRng) {
        *self = Pong::new();
        self.serve(rng);
    }

    fn translate(&mut self, event: &InputEvent) -> Option<Intent> {
        let position = match *event {
            InputEvent::PointerMove { y, .. } | InputEvent::TouchMove { y, .. } => {
                center_paddle(y, PADDLE_HEIGHT, HEIGHT)
            }
            InputEvent::KeyDown { key: Key::ArrowUp | Key::W } => self.player_y - KEY_STEP,
            InputEvent::KeyDown { key: Key::ArrowDown | Key::S } => self.player_y + KEY_STEP,
            _ => return None,
        };
        Some(Intent::PaddleTo { position })
    }

    fn apply(&mut self, intent: Intent, _ctx: &mut TickContext<'_>) -> TickResult {
        if let Intent::PaddleTo { position } = intent {
            self.player_y = position.clamp(0.0, HEIGHT - PADDLE_HEIGHT);
        }
        TickResult::none()
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();

        self.ball = self.ball + self.velocity;

        // Top and bottom walls
        if self.ball.y <= 0.0 || self.ball.y >= HEIGHT - BALL_SIZE {
            self.velocity.y = -self.velocity.y;
            self.ball.y = self.ball.y.clamp(0.0, HEIGHT - BALL_SIZE);
        }

        let ball_rect = Rect::square(self.ball, BALL_SIZE);
        let player = self.player_paddle();
        let ai = self.ai_paddle();

        if rects_touch(&ball_rect, &player) {
            self.velocity.x = self.velocity.x.abs();
            self.velocity.y = paddle_spin(self.ball.y, player.y, PADDLE_HEIGHT);
        }
        if rects_touch(&ball_rect, &ai) {
            self.velocity.x = -self.velocity.x.abs();
            self.velocity.y = paddle_spin(self.ball.y, ai.y, PADDLE_HEIGHT);
        }

        let scored = if self.ball.x <= 0.0 {
            self.ai_score += 1;
            true
        } else if self.ball.x >= WIDTH {
            self.player_score += 1;
            true
        } else {
            false
        };

        if scored {
            result.push(GameEvent::point_scored(ctx.tick, self.player_score, self.ai_score));
            self.serve(ctx.rng);

            if self.player_score >= WINNING_SCORE {
                result.finish(Outcome::Won);
            } else if self.ai_score >= WINNING_SCORE {
                result.finish(Outcome::Over);
            }
        }

        self.track_ball();
        result
    }

    fn render(&self, frame: &mut Frame) {
        frame.clear(Color::rgb(15, 23, 42));

        // Dashed centre line
        let mut y = 0.0;
        while y < HEIGHT {
            frame.line(
                Vec2::new(WIDTH / 2.0, y),
                Vec2::new(WIDTH / 2.0, (y + 5.0).min(HEIGHT)),
                Color::rgb(148, 163, 184),
                2.0,
            );
            y += 10.0;
        }

        frame.fill_rect(self.player_paddle(), Color::rgb(34, 197, 94));
        frame.fill_rect(self.ai_paddle(), Color::rgb(239, 68, 68));
        frame.fill_rect(Rect::square(self.ball, BALL_SIZE), Color::rgb(251, 191, 36));

        frame.text(
            Vec2::new(WIDTH / 2.0, 24.0),
            format!("Player: {} | AI: {}", self.player_score, self.ai_score),
            18.0,
            Color::WHITE,
            TextAlign::Center,
        );
    }

    fn canvas_size(&self) -> (f32, f32) {
        (WIDTH, HEIGHT)
    }

    fn score(&self) -> u32 {
        self.player_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Pong, DeterministicRng) {
        let mut rng = DeterministicRng::new(8);
        let mut game = Pong::new();
        game.reset(&mut rng);
        (game, rng)
    }

    fn step(game: &mut Pong, rng: &mut DeterministicRng) -> TickResult {
        game.tick(&mut TickContext { tick: 1, rng })
    }

    fn is_serve_velocity(v: Vec2) -> bool {
        v.x.abs() == 5.0 && v.y.abs() == 3.0
    }

    #[test]
    fn test_reset_serves_from_center() {
        let (game, _) = fresh();
        assert_eq!(game.ball(), CENTER);
        assert!(is_serve_velocity(game.velocity()));
        assert_eq!(game.scores(), (0, 0));
    }

    #[test]
    fn test_ball_past_left_edge_scores_for_ai() {
        let (mut game, mut rng) = fresh();
        // Far from the player paddle
        game.player_y = 0.0;
        game.ball = Vec2::new(3.0, 250.0);
        game.velocity = Vec2::new(-5.0, 0.0);

        let result = step(&mut game, &mut rng);

        assert_eq!(game.scores(), (0, 1));
        assert_eq!(game.ball(), CENTER);
        assert!(is_serve_velocity(game.velocity()));
        assert_eq!(result.events, vec![GameEvent::point_scored(1, 0, 1)]);
        assert_eq!(result.outcome, None);
    }

    #[test]
    fn test_ball_past_right_edge_scores_for_player() {
        let (mut game, mut rng) = fresh();
        game.ai_y = 0.0;
        game.ball = Vec2::new(598.0, 250.0);
        game.velocity = Vec2::new(5.0, 0.0);

        step(&mut game, &mut rng);
        assert_eq!(game.scores(), (1, 0));
    }

    #[test]
    fn test_wall_bounce() {
        let (mut game, mut rng) = fresh();
        game.ball = Vec2::new(300.0, 2.0);
        game.velocity = Vec2::new(5.0, -3.0);

        step(&mut game, &mut rng);
        assert_eq!(game.velocity().y, 3.0);
        assert_eq!(game.ball().y, 0.0);
    }

    #[test]
    fn test_player_paddle_reflects() {
        let (mut game, mut rng) = fresh();
        game.player_y = 120.0;
        game.ball = Vec2::new(35.0, 145.0);
        game.velocity = Vec2::new(-5.0, 0.0);

        step(&mut game, &mut rng);
        assert_eq!(game.velocity().x, 5.0);
        // Hit near the middle: small spin
        assert!(game.velocity().y.abs() < 1.0);
    }

    #[test]
    fn test_ai_tracks_with_dead_zone() {
        let (mut game, _) = fresh();
        game.ai_y = 120.0;

        game.ball = Vec2::new(300.0, 148.0);
        game.track_ball();
        assert_eq!(game.ai_y, 120.0);

        game.ball = Vec2::new(300.0, 10.0);
        game.track_ball();
        assert_eq!(game.ai_y, 116.0);

        game.ai_y = 1.0;
        game.track_ball();
        assert_eq!(game.ai_y, 0.0);
    }

    #[test]
    fn test_pointer_clamped() {
        let (mut game, mut rng) = fresh();
        let intent = game.translate(&InputEvent::PointerMove { x: 0.0, y: 5.0 }).unwrap();
        game.apply(intent, &mut TickContext { tick: 0, rng: &mut rng });
        assert_eq!(game.player_paddle().y, 0.0);

        let intent = game.translate(&InputEvent::PointerMove { x: 0.0, y: 290.0 }).unwrap();
        game.apply(intent, &mut TickContext { tick: 0, rng: &mut rng });
        assert_eq!(game.player_paddle().y, HEIGHT - PADDLE_HEIGHT);
    }

    #[test]
    fn test_fifth_point_ends() {
        let (mut game, mut rng) = fresh();
        game.ai_score = 4;
        game.player_y = 0.0;
        game.ball = Vec2::new(3.0, 250.0);
        game.velocity = Vec2::new(-5.0, 0.0);

        let result = step(&mut game, &mut rng);
        assert_eq!(result.outcome, Some(Outcome::Over));

        game.player_score = 4;
        game.ai_y = 0.0;
        game.ball = Vec2::new(598.0, 250.0);
        game.velocity = Vec2::new(5.0, 0.0);
        assert_eq!(step(&mut game, &mut rng).outcome, Some(Outcome::Won));
    }
}
