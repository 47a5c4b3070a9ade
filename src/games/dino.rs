//! Dino run
//!
//! An endless runner. Obstacles scroll in from the right at a speed that
//! creeps up every tick; the dino can only jump from the ground. Every tick
//! survived is a point and any contact ends the run.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::{Rect, Vec2};
use crate::game::collision::rects_overlap;
use crate::game::events::GameEvent;
use crate::game::input::{InputEvent, Intent, Key};
use crate::game::phase::Outcome;
use crate::game::render::{Color, Frame};
use crate::game::session::{Game, TickContext, TickResult};
use crate::games::{GameKind, ARCADE_TICK};

pub const WIDTH: f32 = 600.0;
pub const HEIGHT: f32 = 200.0;
pub const GROUND_Y: f32 = HEIGHT - 20.0;
pub const DINO_X: f32 = 50.0;
pub const DINO_WIDTH: f32 = 30.0;
pub const DINO_HEIGHT: f32 = 40.0;
pub const GRAVITY: f32 = 0.8;
pub const JUMP_STRENGTH: f32 = -15.0;
pub const START_SPEED: f32 = 5.0;
pub const MAX_SPEED: f32 = 8.0;
pub const SPEED_STEP: f32 = 0.001;
/// Chance that a new obstacle is a cactus rather than a bird.
pub const CACTUS_CHANCE: f32 = 0.7;
pub const OBSTACLE_SPACING: f32 = 200.0;

const STANDING_Y: f32 = GROUND_Y - DINO_HEIGHT;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    Cactus,
    Bird,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub kind: ObstacleKind,
    pub rect: Rect,
}

impl Obstacle {
    pub fn spawn(kind: ObstacleKind) -> Self {
        let rect = match kind {
            ObstacleKind::Cactus => Rect::new(WIDTH, GROUND_Y - 40.0, 20.0, 40.0),
            // Flying 80 px above the ground
            ObstacleKind::Bird => Rect::new(WIDTH, GROUND_Y - 80.0, 30.0, 20.0),
        };
        Self { kind, rect }
    }
}

pub struct DinoRun {
    dino_y: f32,
    velocity: f32,
    on_ground: bool,
    obstacles: Vec<Obstacle>,
    speed: f32,
    score: u32,
}

impl DinoRun {
    pub fn new() -> Self {
        Self {
            dino_y: STANDING_Y,
            velocity: 0.0,
            on_ground: true,
            obstacles: Vec::new(),
            speed: START_SPEED,
            score: 0,
        }
    }

    pub fn dino(&self) -> Rect {
        Rect::new(DINO_X, self.dino_y, DINO_WIDTH, DINO_HEIGHT)
    }

    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    fn random_obstacle(rng: &mut DeterministicRng) -> Obstacle {
        if rng.next_bool(CACTUS_CHANCE) {
            Obstacle::spawn(ObstacleKind::Cactus)
        } else {
            Obstacle::spawn(ObstacleKind::Bird)
        }
    }
}

impl Default for DinoRun {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for DinoRun {
    fn kind(&self) -> GameKind {
        GameKind::Dino
    }

    fn tick_period(&self) -> Duration {
        ARCADE_TICK
    }

    fn reset(&mut self, _rng: &mut DeterministicRng) {
        *self = DinoRun::new();
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
            if self.on_ground {
                self.velocity = JUMP_STRENGTH;
                self.on_ground = false;
            } else {
                tracing::debug!("jump ignored mid-air");
            }
        }
        TickResult::none()
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();

        if !self.on_ground {
            self.velocity += GRAVITY;
            self.dino_y += self.velocity;
            if self.dino_y >= STANDING_Y {
                self.dino_y = STANDING_Y;
                self.velocity = 0.0;
                self.on_ground = true;
            }
        }

        for obstacle in &mut self.obstacles {
            obstacle.rect.x -= self.speed;
        }
        self.obstacles.retain(|o| o.rect.right() > 0.0);

        let needs_obstacle = self
            .obstacles
            .last()
            .map_or(true, |o| o.rect.x < WIDTH - OBSTACLE_SPACING);
        if needs_obstacle {
            self.obstacles.push(Self::random_obstacle(ctx.rng));
        }

        self.score += 1;
        self.speed = (self.speed + SPEED_STEP).min(MAX_SPEED);

        let dino = self.dino();
        if self.obstacles.iter().any(|o| rects_overlap(&dino, &o.rect)) {
            result.push(GameEvent::score_changed(ctx.tick, self.score));
            result.finish(Outcome::Over);
        }

        result
    }

    fn render(&self, frame: &mut Frame) {
        frame.clear(Color::rgb(0xf7, 0xf7, 0xf7));
        frame.line(
            Vec2::new(0.0, GROUND_Y),
            Vec2::new(WIDTH, GROUND_Y),
            Color::rgb(0x53, 0x53, 0x53),
            2.0,
        );

        frame.fill_rect(self.dino(), Color::rgb(0x53, 0x53, 0x53));
        for obstacle in &self.obstacles {
            let color = match obstacle.kind {
                ObstacleKind::Cactus => Color::rgb(0x2d, 0x8a, 0x2d),
                ObstacleKind::Bird => Color::rgb(0x8b, 0x45, 0x13),
            };
            frame.fill_rect(obstacle.rect, color);
        }

        frame.hud(0, format!("Score: {}", self.score), Color::rgb(0x53, 0x53, 0x53));
    }

    fn canvas_size(&self) -> (f32, f32) {
        (WIDTH, HEIGHT)
    }

    fn score(&self) -> u32 {
        self.score
    }
}
