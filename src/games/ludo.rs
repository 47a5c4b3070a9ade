//! Ludo
//!
//! Four players (red, blue, green, yellow) with four tokens each. Token
//! progress runs from 0 (home) to 57 (finished). A home token needs a six
//! to enter the track; otherwise a token advances by the roll, capped at
//! the finish. A six grants another roll. With no legal move the turn
//! passes. The first player with all four tokens finished wins.
//!
//! CPU seats roll and move on tick timers, picking uniformly among legal
//! tokens.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::core::vec2::{Rect, Vec2};
use crate::game::events::{Actor, GameEvent};
use crate::game::input::{InputEvent, Intent, Key};
use crate::game::phase::Outcome;
use crate::game::render::{Color, Frame, TextAlign};
use crate::game::session::{Game, TickContext, TickResult};
use crate::games::{GameKind, TURN_TICK};

pub const FINISH: u8 = 57;
pub const TOKENS: usize = 4;
pub const PLAYERS: usize = 4;

/// Ticks before a CPU rolls (500 ms).
pub const CPU_ROLL_DELAY: u32 = 5;
/// Ticks between a CPU roll and its move (1 s).
pub const CPU_MOVE_DELAY: u32 = 10;

const BOARD_SIZE: f32 = 400.0;
const TRACK_RADIUS: f32 = 100.0;

// =============================================================================
// PLAYERS AND MODES
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Yellow,
}

impl PlayerColor {
    pub const ALL: [PlayerColor; 4] = [PlayerColor::Red, PlayerColor::Blue, PlayerColor::Green, PlayerColor::Yellow];

    fn paint(self) -> Color {
        match self {
            PlayerColor::Red => Color::RED,
            PlayerColor::Blue => Color::BLUE,
            PlayerColor::Green => Color::GREEN,
            PlayerColor::Yellow => Color::YELLOW,
        }
    }
}

/// Seat assignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LudoMode {
    #[default]
    #[serde(rename = "1p-3cpu")]
    OneHuman,
    #[serde(rename = "2p-2cpu")]
    TwoHumans,
    #[serde(rename = "3p-1cpu")]
    ThreeHumans,
    #[serde(rename = "local")]
    Local,
}

impl LudoMode {
    pub fn humans(self) -> usize {
        match self {
            LudoMode::OneHuman => 1,
            LudoMode::TwoHumans => 2,
            LudoMode::ThreeHumans => 3,
            LudoMode::Local => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LudoMode::OneHuman => "1p-3cpu",
            LudoMode::TwoHumans => "2p-2cpu",
            LudoMode::ThreeHumans => "3p-1cpu",
            LudoMode::Local => "local",
        }
    }
}

impl fmt::Display for LudoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LudoMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1p-3cpu" => Ok(LudoMode::OneHuman),
            "2p-2cpu" => Ok(LudoMode::TwoHumans),
            "3p-1cpu" => Ok(LudoMode::ThreeHumans),
            "local" => Ok(LudoMode::Local),
            other => Err(format!("unknown ludo mode {other:?}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LudoPlayer {
    pub color: PlayerColor,
    pub is_cpu: bool,
    pub tokens: [u8; TOKENS],
    pub name: String,
}

impl LudoPlayer {
    pub fn finished(&self) -> usize {
        self.tokens.iter().filter(|&&t| t == FINISH).count()
    }

    pub fn at_home(&self) -> usize {
        self.tokens.iter().filter(|&&t| t == 0).count()
    }

    pub fn has_won(&self) -> bool {
        self.tokens.iter().all(|&t| t == FINISH)
    }
}

/// Seats in colour order; the first `mode.humans()` are human.
pub fn create_players(mode: LudoMode) -> Vec<LudoPlayer> {
    let humans = mode.humans();
    PlayerColor::ALL
        .iter()
        .enumerate()
        .map(|(i, &color)| {
            let is_cpu = i >= humans;
            let name = if is_cpu {
                format!("CPU {}", i + 1 - humans)
            } else {
                format!("Player {}", i + 1)
            };
            LudoPlayer {
                color,
                is_cpu,
                tokens: [0; TOKENS],
                name,
            }
        })
        .collect()
}

// =============================================================================
// MOVE RULES
// =============================================================================

/// Where a token at `progress` lands with `roll`, or `None` if it cannot move.
pub fn move_target(progress: u8, roll: u8) -> Option<u8> {
    match progress {
        0 if roll == 6 => Some(1),
        0 => None,
        FINISH => None,
        p => Some((p + roll).min(FINISH)),
    }
}

/// Tokens that can move with `roll`.
pub fn legal_tokens(tokens: &[u8; TOKENS], roll: u8) -> Vec<u8> {
    (0..TOKENS as u8)
        .filter(|&t| move_target(tokens[t as usize], roll).is_some())
        .collect()
}

// =============================================================================
// GAME
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CpuAction {
    Roll,
    Move,
}

pub struct Ludo {
    mode: LudoMode,
    players: Vec<LudoPlayer>,
    current: usize,
    dice: Option<u8>,
    winner: Option<usize>,
    cpu: Option<(CpuAction, u32)>,
}

impl Ludo {
    pub fn new(mode: LudoMode) -> Self {
        let mut game = Self {
            mode,
            players: create_players(mode),
            current: 0,
            dice: None,
            winner: None,
            cpu: None,
        };
        game.schedule_cpu_roll();
        game
    }

    pub fn mode(&self) -> LudoMode {
        self.mode
    }

    pub fn players(&self) -> &[LudoPlayer] {
        &self.players
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn dice(&self) -> Option<u8> {
        self.dice
    }

    pub fn winner(&self) -> Option<&LudoPlayer> {
        self.winner.map(|i| &self.players[i])
    }

    fn current_is_cpu(&self) -> bool {
        self.players[self.current].is_cpu
    }

    fn actor(&self) -> Actor {
        if self.current_is_cpu() {
            Actor::Computer(self.current as u8)
        } else {
            Actor::Human(self.current as u8)
        }
    }

    fn schedule_cpu_roll(&mut self) {
        self.cpu = self.current_is_cpu().then_some((CpuAction::Roll, CPU_ROLL_DELAY));
    }

    fn roll(&mut self, ctx: &mut TickContext<'_>, result: &mut TickResult) {
        let roll = ctx.rng.next_int_range(1, 6) as u8;
        result.push(GameEvent::dice_rolled(ctx.tick, self.current as u8, roll));

        if legal_tokens(&self.players[self.current].tokens, roll).is_empty() {
            debug!(seat = self.current, roll, "No legal move");
            self.next_turn(ctx.tick, result);
            return;
        }

        self.dice = Some(roll);
        if self.current_is_cpu() {
            self.cpu = Some((CpuAction::Move, CPU_MOVE_DELAY));
        }
    }

    /// Advance `token` by the current roll. Returns false if not legal.
    fn move_token(&mut self, token: u8, tick: u32, result: &mut TickResult) -> bool {
        let Some(roll) = self.dice else {
            return false;
        };
        let Some(slot) = self.players[self.current].tokens.get_mut(token as usize) else {
            return false;
        };
        let Some(target) = move_target(*slot, roll) else {
            return false;
        };
        *slot = target;

        result.push(GameEvent::move_played(tick, self.actor(), format!("t{token}:{target}")));
        if self.current == 0 {
            result.push(GameEvent::score_changed(tick, self.players[0].finished() as u32));
        }

        if self.players[self.current].has_won() {
            self.winner = Some(self.current);
            self.dice = None;
            self.cpu = None;
            result.finish(if self.current_is_cpu() { Outcome::Over } else { Outcome::Won });
            return true;
        }

        if roll == 6 {
            self.dice = None;
            self.schedule_cpu_roll();
        } else {
            self.next_turn(tick, result);
        }
        true
    }

    fn next_turn(&mut self, tick: u32, result: &mut TickResult) {
        self.current = (self.current + 1) % self.players.len();
        self.dice = None;
        result.push(GameEvent::turn_changed(tick, self.current as u8));
        self.schedule_cpu_roll();
    }
}

impl Game for Ludo {
    fn kind(&self) -> GameKind {
        GameKind::Ludo
    }

    fn tick_period(&self) -> Duration {
        TURN_TICK
    }

    fn reset(&mut self, _rng: &mut DeterministicRng) {
        *self = Ludo::new(self.mode);
    }

    fn translate(&mut self, event: &InputEvent) -> Option<Intent> {
        match *event {
            InputEvent::RollDice | InputEvent::KeyDown { key: Key::Space | Key::Enter } => {
                Some(Intent::RollDice)
            }
            InputEvent::SelectToken { token } => Some(Intent::MoveToken { token }),
            _ => None,
        }
    }

    fn apply(&mut self, intent: Intent, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();
        if self.winner.is_some() || self.current_is_cpu() {
            debug!(?intent, seat = self.current, "Not a human turn");
            return result;
        }

        match intent {
            Intent::RollDice if self.dice.is_none() => self.roll(ctx, &mut result),
            Intent::MoveToken { token } => {
                if !self.move_token(token, ctx.tick, &mut result) {
                    debug!(token, dice = ?self.dice, "Token move rejected");
                }
            }
            _ => debug!(?intent, "Intent ignored"),
        }
        result
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        let mut result = TickResult::none();

        let Some((action, remaining)) = self.cpu else {
            return result;
        };
        if remaining > 1 {
            self.cpu = Some((action, remaining - 1));
            return result;
        }
        self.cpu = None;

        match action {
            CpuAction::Roll => self.roll(ctx, &mut result),
            CpuAction::Move => {
                let roll = self.dice.unwrap_or(0);
                let legal = legal_tokens(&self.players[self.current].tokens, roll);
                match ctx.rng.choose(&legal).copied() {
                    Some(token) => {
                        self.move_token(token, ctx.tick, &mut result);
                    }
                    None => self.next_turn(ctx.tick, &mut result),
                }
            }
        }
        result
    }

    fn render(&self, frame: &mut Frame) {
        frame.clear(Color::WHITE);

        let half = BOARD_SIZE / 2.0;
        let quadrant = |i: usize| {
            let (qx, qy) = match i {
                0 => (0.0, 0.0),
                1 => (half, 0.0),
                2 => (half, half),
                _ => (0.0, half),
            };
            Rect::new(qx, qy, half, half)
        };

        for (i, player) in self.players.iter().enumerate() {
            let area = quadrant(i);
            frame.fill_rect(Rect::new(area.x + 10.0, area.y + 10.0, 80.0, 80.0), player.color.paint());
            if i == self.current && self.winner.is_none() {
                frame.stroke_rect(area, Color::PURPLE, 4.0);
            }
        }
        frame.fill_rect(Rect::new(half - 30.0, half - 30.0, 60.0, 60.0), Color::LIGHT_GRAY);

        let center = Vec2::new(half, half);
        for (i, player) in self.players.iter().enumerate() {
            let area = quadrant(i);
            for (t, &progress) in player.tokens.iter().enumerate() {
                let pos = match progress {
                    0 => Vec2::new(
                        area.x + 30.0 + 40.0 * (t % 2) as f32,
                        area.y + 30.0 + 40.0 * (t / 2) as f32,
                    ),
                    FINISH => center,
                    p => {
                        let angle = ((p - 1) as f32 * 6.0).to_radians();
                        Vec2::new(center.x + TRACK_RADIUS * angle.sin(), center.y - TRACK_RADIUS * angle.cos())
                    }
                };
                frame.fill_circle(pos, 10.0, player.color.paint());
            }
        }

        let status = match self.winner() {
            Some(w) => format!("{} wins!", w.name),
            None => format!("{}'s turn", self.players[self.current].name),
        };
        frame.text(Vec2::new(half, BOARD_SIZE + 30.0), status, 20.0, Color::BLACK, TextAlign::Center);

        let dice = self.dice.map_or("-".to_string(), |d| d.to_string());
        frame.text(Vec2::new(half, BOARD_SIZE + 60.0), format!("Dice: {dice}"), 20.0, Color::BLACK, TextAlign::Center);

        for (i, player) in self.players.iter().enumerate() {
            frame.text(
                Vec2::new(10.0, BOARD_SIZE + 90.0 + 20.0 * i as f32),
                format!("{}: home {} | finished {}", player.name, player.at_home(), player.finished()),
                14.0,
                player.color.paint(),
                TextAlign::Left,
            );
        }
    }

    fn canvas_size(&self) -> (f32, f32) {
        (BOARD_SIZE, BOARD_SIZE + 180.0)
    }

    fn score(&self) -> u32 {
        self.players[0].finished() as u32
    }
}
