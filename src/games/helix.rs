//! Helix jump
//!
//! A ball bounces down a tower of ring platforms, each with one gap.
//! Dragging horizontally rotates the tower under the ball. Landing on a
//! solid part while falling bounces the ball back up for a point; over a gap
//! the ball falls through to the next ring. Getting below the last ring wins.
//!
//! Angles are degrees in the tower's frame. The ball hangs at screen angle
//! zero, so with the tower rotated by `r` it sits over tower angle `-r`.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::{Rect, Vec2};
use crate::game::collision::{angle_in_arc, normalize_degrees};
use crate::game::events::GameEvent;
use crate::game::input::{DragTracker, InputEvent, Intent};
use crate::game::phase::Outcome;
use crate::game::render::{Color, Frame};
use crate::game::session::{Game, TickContext, TickResult};
use crate::games::{GameKind, ARCADE_TICK};

pub const WIDTH: f32 = 400.0;
pub const HEIGHT: f32 = 600.0;
pub const BALL_SIZE: f32 = 15.0;
pub const BALL_START_Y: f32 = 100.0;
pub const PLATFORM_COUNT: usize = 50;
pub const PLATFORM_HEIGHT: f32 = 20.0;
pub const PLATFORM_SPACING: f32 = 80.0;
pub const FIRST_PLATFORM_Y: f32 = 200.0;
pub const MIN_GAP: f32 = 80.0;
pub const MAX_GAP: f32 = 120.0;
pub const GRAVITY: f32 = 0.5;
pub const BOUNCE_VELOCITY: f32 = -8.0;
/// Tower rotation per pixel dragged.
pub const DEGREES_PER_PIXEL: f32 = 0.5;
pub const TOWER_RADIUS: f32 = 120.0;
/// Screen offset of the ball below the camera top.
const CAMERA_LEAD: f32 = 300.0;

const PLATFORM_COLORS: [Color; 8] = [
    Color::rgb(0xff, 0x6b, 0x6b),
    Color::rgb(0x4e, 0xcd, 0xc4),
    Color::rgb(0x45, 0xb7, 0xd1),
    Color::rgb(0x96, 0xce, 0xb4),
    Color::rgb(0xfe, 0xca, 0x57),
    Color::rgb(0xff, 0x9f, 0xf3),
    Color::rgb(0xa8, 0xe6, 0xcf),
    Color::rgb(0xff, 0xd9, 0x3d),
];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    /// Top edge in world coordinates
    pub y: f32,
    pub gap_start: f32,
    pub gap_len: f32,
}

impl Platform {
    pub fn has_gap_at(&self, angle: f32) -> bool {
        angle_in_arc(angle, self.gap_start, self.gap_len)
    }

    pub fn bottom(&self) -> f32 {
        self.y + PLATFORM_HEIGHT
    }
}

/// The tower, top to bottom.
pub fn generate_platforms(rng: &mut DeterministicRng) -> Vec<Platform> {
    (0..PLATFORM_COUNT)
        .map(|i| {
            let gap_len = rng.next_f32_range(MIN_GAP, MAX_GAP);
            Platform {
                y: i as f32 * PLATFORM_SPACING + FIRST_PLATFORM_Y,
                gap_start: rng.next_f32() * (360.0 - gap_len),
                gap_len,
            }
        })
        .collect()
}

pub struct HelixJump {
    ball_y: f32,
    velocity: f32,
    rotation: f32,
    platforms: Vec<Platform>,
    drag: DragTracker,
    camera_y: f32,
    score: u32,
}

impl HelixJump {
    pub fn new() -> Self {
        Self {
            ball_y: BALL_START_Y,
            velocity: 0.0,
            rotation: 0.0,
            platforms: Vec::new(),
            drag: DragTracker::default(),
            camera_y: 0.0,
            score: 0,
        }
    }

    pub fn ball_y(&self) -> f32 {
        self.ball_y
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn camera_y(&self) -> f32 {
        self.camera_y
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Tower angle currently under the ball.
    pub fn ball_angle(&self) -> f32 {
        normalize_degrees(-self.rotation)
    }

    /// The first solid platform the falling ball is touching, if any.
    fn landing(&self) -> Option<&Platform> {
        if self.velocity <= 0.0 {
            return None;
        }
        let angle = self.ball_angle();
        self.platforms.iter().find(|p| {
            self.ball_y + BALL_SIZE >= p.y && self.ball_y <= p.bottom() && !p.has_gap_at(angle)
        })
    }

    fn below_tower(&self) -> bool {
        self.platforms
            .last()
            .map_or(true, |p| self.ball_y > p.bottom())
    }

    fn render_platform(&self, frame: &mut Frame, index: usize, platform: &Platform) {
        let screen_y = platform.y - self.camera_y;
        let left = WIDTH / 2.0 - TOWER_RADIUS;
        let color = PLATFORM_COLORS[index % PLATFORM_COLORS.len()];
        frame.fill_rect(
            Rect::new(left, screen_y, TOWER_RADIUS * 2.0, PLATFORM_HEIGHT),
            color,
        );

        // Gap on the visible half of the ring, projected onto the bar
        let start = platform.gap_start + self.rotation;
        let end = start + platform.gap_len;
        let mid = (start + end) / 2.0;
        if mid.to_radians().cos() > 0.0 {
            let a = WIDTH / 2.0 + start.to_radians().sin() * TOWER_RADIUS;
            let b = WIDTH / 2.0 + end.to_radians().sin() * TOWER_RADIUS;
            let (x0, x1) = if a < b { (a, b) } else { (b, a) };
            frame.fill_rect(
                Rect::new(x0, screen_y, x1 - x0, PLATFORM_HEIGHT),
                Color::rgb(0x1e, 0x1b, 0x4b),
            );
        }
    }
}

impl Default for HelixJump {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for HelixJump {
    fn kind(&self) -> GameKind {
        GameKind::Helix
    }

    fn tick_period(&self) -> Duration {
        ARCADE_TICK
    }

    fn reset(&mut self, rng: &mut DeterministicRng) {
        *self = HelixJump::new();
        self.platforms = generate_platforms(rng);
    }

    fn translate(&mut self, event: &InputEvent) -> Option<Intent> {
        match *event {
            InputEvent::PointerDown { x, .. } | InputEvent::TouchStart { x, .. } => {
                self.drag.press(x);
                None
            }
            InputEvent::PointerMove { x, .. } | InputEvent::TouchMove { x, .. } => self
                .drag
                .drag(x)
                .map(|dx| Intent::Rotate { degrees: dx * DEGREES_PER_PIXEL }),
            InputEvent::PointerUp | InputEvent::TouchEnd => {
                self.drag.release();
                None
            }
            _ => None,
        }
    }

    fn apply(&mut self, intent: Intent, _ctx: &mut TickContext<'_>) -> TickResult {
        if let Intent::Rotate { degrees } = intent {
            self.rotation = normalize_degrees(self.rotation + degrees);
        }
        TickResult::none()
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();

        self.velocity += GRAVITY;
        self.ball_y += self.velocity;

        if let Some(top) = self.landing().map(|p| p.y) {
            self.ball_y = top - BALL_SIZE;
            self.velocity = BOUNCE_VELOCITY;
            self.score += 1;
            result.push(GameEvent::score_changed(ctx.tick, self.score));
        }

        self.camera_y = self.ball_y - CAMERA_LEAD;

        if self.below_tower() {
            result.finish(Outcome::Won);
        }
        result
    }

    fn render(&self, frame: &mut Frame) {
        frame.clear(Color::rgb(0x1e, 0x1b, 0x4b));

        // Tower column
        frame.fill_rect(
            Rect::new(WIDTH / 2.0 - 20.0, 0.0, 40.0, HEIGHT),
            Color::rgb(0x31, 0x2e, 0x81),
        );

        for (i, platform) in self.platforms.iter().enumerate() {
            let screen_y = platform.y - self.camera_y;
            if screen_y + PLATFORM_HEIGHT < 0.0 || screen_y > HEIGHT {
                continue;
            }
            self.render_platform(frame, i, platform);
        }

        let radius = BALL_SIZE / 2.0;
        frame.fill_circle(
            Vec2::new(WIDTH / 2.0, self.ball_y - self.camera_y + radius),
            radius,
            Color::WHITE,
        );

        frame.hud(0, format!("Score: {}", self.score), Color::WHITE);
    }

    fn canvas_size(&self) -> (f32, f32) {
        (WIDTH, HEIGHT)
    }

    fn score(&self) -> u32 {
        self.score
    }
}
