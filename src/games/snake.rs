//! Snake
//!
//! 20×20 grid, one step per 150 ms tick. The snake starts as a single
//! segment at (10, 10) heading right. Eating food grows it by one and
//! scores 10. Hitting a wall or its own body ends the game; filling the
//! whole board wins it.

use std::collections::VecDeque;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Rect;
use crate::game::events::GameEvent;
use crate::game::input::{Direction, InputEvent, Intent};
use crate::game::phase::Outcome;
use crate::game::render::{Color, Frame};
use crate::game::session::{Game, TickContext, TickResult};
use crate::games::GameKind;

pub const GRID_SIZE: i32 = 20;
pub const CELL_SIZE: f32 = 20.0;
pub const TICK: Duration = Duration::from_millis(150);
pub const FOOD_POINTS: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn moved(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn in_bounds(self) -> bool {
        (0..GRID_SIZE).contains(&self.x) && (0..GRID_SIZE).contains(&self.y)
    }
}

/// What the head ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionType {
    Wall,
    SelfCollision,
}

pub struct Snake {
    /// Head at the front
    body: VecDeque<Cell>,
    heading: Direction,
    /// Direction requested since the last step
    pending: Option<Direction>,
    food: Cell,
    score: u32,
}

impl Snake {
    pub fn new() -> Self {
        Self {
            body: VecDeque::from([Cell::new(10, 10)]),
            heading: Direction::Right,
            pending: None,
            food: Cell::new(5, 5),
            score: 0,
        }
    }

    pub fn head(&self) -> Cell {
        // Body is never empty: it starts with one segment and only grows
        self.body.front().copied().unwrap_or(Cell::new(10, 10))
    }

    pub fn body(&self) -> impl Iterator<Item = Cell> + '_ {
        self.body.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn heading(&self) -> Direction {
        self.heading
    }

    pub fn food(&self) -> Cell {
        self.food
    }

    /// Request a heading change; a reversal onto the body is refused.
    pub fn steer(&mut self, direction: Direction) -> bool {
        if direction.is_opposite(self.heading) {
            return false;
        }
        self.pending = Some(direction);
        true
    }

    /// Wall or body hit for a prospective head position.
    pub fn check_collision(&self, head: Cell) -> Option<CollisionType> {
        if !head.in_bounds() {
            return Some(CollisionType::Wall);
        }
        if self.body.contains(&head) {
            return Some(CollisionType::SelfCollision);
        }
        None
    }

    /// Pick a free cell for food, or `None` if the snake fills the board.
    fn spawn_food(&self, rng: &mut DeterministicRng) -> Option<Cell> {
        let free: Vec<Cell> = (0..GRID_SIZE)
            .flat_map(|y| (0..GRID_SIZE).map(move |x| Cell::new(x, y)))
            .filter(|c| !self.body.contains(c))
            .collect();
        rng.choose(&free).copied()
    }
}

impl Default for Snake {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for Snake {
    fn kind(&self) -> GameKind {
        GameKind::Snake
    }

    fn tick_period(&self) -> Duration {
        TICK
    }

    fn reset(&mut self, rng: &mut DeterministicRng) {
        *self = Snake::new();
        if let Some(food) = self.spawn_food(rng) {
            self.food = food;
        }
    }

    fn translate(&mut self, event: &InputEvent) -> Option<Intent> {
        match event {
            InputEvent::KeyDown { key } => {
                Direction::from_key(*key).map(|direction| Intent::Steer { direction })
            }
            _ => None,
        }
    }

    fn apply(&mut self, intent: Intent, _ctx: &mut TickContext<'_>) -> TickResult {
        if let Intent::Steer { direction } = intent {
            if !self.steer(direction) {
                debug!(?direction, heading = ?self.heading, "Reversal rejected");
            }
        }
        TickResult::none()
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();

        if let Some(direction) = self.pending.take() {
            self.heading = direction;
        }

        let new_head = self.head().moved(self.heading);
        if let Some(collision) = self.check_collision(new_head) {
            debug!(?collision, ?new_head, "Snake crashed");
            result.finish(Outcome::Over);
            return result;
        }

        self.body.push_front(new_head);

        if new_head == self.food {
            self.score += FOOD_POINTS;
            result.push(GameEvent::score_changed(ctx.tick, self.score));

            match self.spawn_food(ctx.rng) {
                Some(food) => self.food = food,
                None => result.finish(Outcome::Won),
            }
        } else {
            self.body.pop_back();
        }

        result
    }

    fn render(&self, frame: &mut Frame) {
        frame.clear(Color::BLACK);

        let cell_rect = |c: Cell, inset: f32| {
            Rect::new(
                c.x as f32 * CELL_SIZE + inset,
                c.y as f32 * CELL_SIZE + inset,
                CELL_SIZE - 2.0 * inset,
                CELL_SIZE - 2.0 * inset,
            )
        };

        for (i, segment) in self.body.iter().enumerate() {
            let color = if i == 0 { Color::GREEN } else { Color::rgb(0x16, 0xa3, 0x4a) };
            frame.fill_rect(cell_rect(*segment, 0.5), color);
        }
        frame.fill_rect(cell_rect(self.food, 2.0), Color::RED);

        frame.hud(0, format!("Score: {}", self.score), Color::WHITE);
    }

    fn canvas_size(&self) -> (f32, f32) {
        let side = GRID_SIZE as f32 * CELL_SIZE;
        (side, side)
    }

    fn score(&self) -> u32 {
        self.score
    }
}
