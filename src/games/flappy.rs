//! Flappy Bird
//!
//! The bird falls under gravity and flaps upward on Space or click. Pipe
//! pairs scroll in from the right with a fixed gap at a random height.
//! Each pipe fully behind the bird scores one. Touching the ceiling, the
//! ground or a pipe ends the game.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Rect;
use crate::game::collision::rects_overlap;
use crate::game::events::GameEvent;
use crate::game::input::{InputEvent, Intent, Key};
use crate::game::phase::Outcome;
use crate::game::render::{Color, Frame};
use crate::game::session::{Game, TickContext, TickResult};
use crate::games::{GameKind, ARCADE_TICK};

pub const WIDTH: f32 = 400.0;
pub const HEIGHT: f32 = 600.0;
pub const BIRD_X: f32 = 50.0;
pub const BIRD_SIZE: f32 = 20.0;
pub const PIPE_WIDTH: f32 = 50.0;
pub const PIPE_GAP: f32 = 150.0;
pub const GRAVITY: f32 = 0.6;
pub const JUMP_STRENGTH: f32 = -12.0;
pub const PIPE_SPEED: f32 = 3.0;
/// A new pipe spawns once the newest one is this far in from the right edge.
pub const PIPE_SPACING: f32 = 200.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pipe {
    pub x: f32,
    /// Bottom edge of the upper pipe; the gap spans `top_height..top_height + PIPE_GAP`
    pub top_height: f32,
    pub passed: bool,
}

impl Pipe {
    pub fn upper(&self) -> Rect {
        Rect::new(self.x, 0.0, PIPE_WIDTH, self.top_height)
    }

    pub fn lower(&self) -> Rect {
        let top = self.top_height + PIPE_GAP;
        Rect::new(self.x, top, PIPE_WIDTH, HEIGHT - top)
    }
}

pub struct FlappyBird {
    bird_y: f32,
    velocity: f32,
    pipes: Vec<Pipe>,
    score: u32,
}

impl FlappyBird {
    pub fn new() -> Self {
        Self {
            bird_y: HEIGHT / 2.0,
            velocity: 0.0,
            pipes: Vec::new(),
            score: 0,
        }
    }

    pub fn bird(&self) -> Rect {
        Rect::new(BIRD_X, self.bird_y, BIRD_SIZE, BIRD_SIZE)
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    fn spawn_pipe(rng: &mut DeterministicRng) -> Pipe {
        Pipe {
            x: WIDTH,
            top_height: rng.next_f32() * (HEIGHT - PIPE_GAP - 100.0) + 50.0,
            passed: false,
        }
    }

    /// Ceiling, ground or any pipe.
    pub fn check_collision(&self) -> bool {
        let bird = self.bird();
        if bird.y <= 0.0 || bird.bottom() >= HEIGHT {
            return true;
        }
        self.pipes
            .iter()
            .any(|p| rects_overlap(&bird, &p.upper()) || rects_overlap(&bird, &p.lower()))
    }
}

impl Default for FlappyBird {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for FlappyBird {
    fn kind(&self) -> GameKind {
        GameKind::Flappy
    }

    fn tick_period(&self) -> Duration {
        ARCADE_TICK
    }

    fn reset(&mut self, _rng: &mut DeterministicRng) {
        *self = FlappyBird::new();
    }

    fn translate(&mut self, event: &InputEvent) -> Option<Intent> {
        match event {
            InputEvent::KeyDown { key: Key::Space | Key::ArrowUp }
            | InputEvent::PointerDown { .. }
            | InputEvent::TouchStart { .. } => Some(Intent::Jump),
            _ => None,
        }
    }

    fn apply(&mut self, intent: Intent, _ctx: &mut TickContext<'_>) -> TickResult {
        if intent == Intent::Jump {
            self.velocity = JUMP_STRENGTH;
        }
        TickResult::none()
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();

        self.velocity += GRAVITY;
        self.bird_y += self.velocity;

        for pipe in &mut self.pipes {
            pipe.x -= PIPE_SPEED;
        }
        self.pipes.retain(|p| p.x + PIPE_WIDTH > 0.0);

        let needs_pipe = self
            .pipes
            .last()
            .map_or(true, |p| p.x < WIDTH - PIPE_SPACING);
        if needs_pipe {
            self.pipes.push(Self::spawn_pipe(ctx.rng));
        }

        for pipe in &mut self.pipes {
            if !pipe.passed && pipe.x + PIPE_WIDTH < BIRD_X {
                pipe.passed = true;
                self.score += 1;
                result.push(GameEvent::score_changed(ctx.tick, self.score));
            }
        }

        if self.check_collision() {
            self.bird_y = self.bird_y.clamp(0.0, HEIGHT - BIRD_SIZE);
            result.finish(Outcome::Over);
        }

        result
    }

    fn render(&self, frame: &mut Frame) {
        frame.clear(Color::SKY);

        let pipe_color = Color::rgb(0x22, 0x8b, 0x22);
        for pipe in &self.pipes {
            frame.fill_rect(pipe.upper(), pipe_color);
            frame.fill_rect(pipe.lower(), pipe_color);
        }

        frame.fill_rect(self.bird(), Color::rgb(0xff, 0xd7, 0x00));
        frame.hud(0, format!("Score: {}", self.score), Color::WHITE);
    }

    fn canvas_size(&self) -> (f32, f32) {
        (WIDTH, HEIGHT)
    }

    fn score(&self) -> u32 {
        self.score
    }
}
