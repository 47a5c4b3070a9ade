//! Game Session
//!
//! A [`Session`] owns one game's state, the lifecycle [`Phase`], the seeded
//! RNG and the tick counter. It is the only thing that mutates game state:
//!
//! 1. `start` / `pause` / `resume` / `restart` drive the phase machine
//! 2. `handle_input` translates a raw event and applies the intent
//! 3. `tick` advances the simulation one fixed step
//! 4. `render` draws the current state plus the phase banner
//!
//! Input and ticks are ignored unless the phase is Running. A terminal
//! outcome from either moves the session to Over or Won.

use std::time::Duration;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::rng::{DeterministicRng, derive_session_seed};
use crate::game::events::GameEvent;
use crate::game::input::{InputEvent, Intent};
use crate::game::phase::{Outcome, Phase, Transition};
use crate::game::render::Frame;
use crate::games::GameKind;

// =============================================================================
// GAME TRAIT
// =============================================================================

/// Per-step context handed to a game.
pub struct TickContext<'a> {
    /// Current tick number
    pub tick: u32,
    /// Session RNG
    pub rng: &'a mut DeterministicRng,
}

/// Result of a tick or an applied intent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickResult {
    /// Events generated
    pub events: Vec<GameEvent>,
    /// Terminal outcome, if the game just ended
    pub outcome: Option<Outcome>,
}

impl TickResult {
    /// Nothing happened.
    pub fn none() -> Self {
        Self::default()
    }

    /// Record an event.
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Mark the game as finished.
    pub fn finish(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }

    /// Builder form of [`TickResult::finish`].
    pub fn finished(outcome: Outcome) -> Self {
        Self {
            events: Vec::new(),
            outcome: Some(outcome),
        }
    }
}

/// One game's rules, simulation and drawing.
///
/// Implementations are plain state structs. They never see the phase: the
/// session only calls `apply` and `tick` while Running.
pub trait Game: Send {
    /// Which game this is.
    fn kind(&self) -> GameKind;

    /// Fixed tick period.
    fn tick_period(&self) -> Duration;

    /// Re-initialise all state for a fresh play-through.
    ///
    /// State that spans play-throughs (tic-tac-toe stats) survives.
    fn reset(&mut self, rng: &mut DeterministicRng);

    /// Input adapter: map a raw event to an intent, or `None` to ignore it.
    fn translate(&mut self, event: &InputEvent) -> Option<Intent>;

    /// Apply an intent between ticks.
    fn apply(&mut self, intent: Intent, ctx: &mut TickContext<'_>) -> TickResult;

    /// Advance the simulation one step.
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult;

    /// Draw the full state.
    fn render(&self, frame: &mut Frame);

    /// Canvas size in pixels.
    fn canvas_size(&self) -> (f32, f32);

    /// Current score of the human player.
    fn score(&self) -> u32;
}

impl<G: Game + ?Sized> Game for Box<G> {
    fn kind(&self) -> GameKind {
        (**self).kind()
    }

    fn tick_period(&self) -> Duration {
        (**self).tick_period()
    }

    fn reset(&mut self, rng: &mut DeterministicRng) {
        (**self).reset(rng)
    }

    fn translate(&mut self, event: &InputEvent) -> Option<Intent> {
        (**self).translate(event)
    }

    fn apply(&mut self, intent: Intent, ctx: &mut TickContext<'_>) -> TickResult {
        (**self).apply(intent, ctx)
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        (**self).tick(ctx)
    }

    fn render(&self, frame: &mut Frame) {
        (**self).render(frame)
    }

    fn canvas_size(&self) -> (f32, f32) {
        (**self).canvas_size()
    }

    fn score(&self) -> u32 {
        (**self).score()
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {transition:?} while {from}")]
    InvalidTransition { from: Phase, transition: Transition },

    #[error("session is not running (phase: {0})")]
    NotRunning(Phase),
}

/// Snapshot of session counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: Phase,
    pub tick: u32,
    pub score: u32,
    pub high_score: u32,
}

/// One play-through of one game.
pub struct Session<G: Game> {
    id: Uuid,
    game: G,
    phase: Phase,
    rng: DeterministicRng,
    seed: u64,
    tick: u32,
    high_score: u32,
    events: Vec<GameEvent>,
}

impl<G: Game> Session<G> {
    /// Create a session whose RNG is derived from its id.
    pub fn new(id: Uuid, game: G) -> Self {
        let seed = derive_session_seed(id.as_bytes(), game.kind().slug());
        Self::with_seed(id, game, seed)
    }

    /// Create a session with an explicit seed.
    pub fn with_seed(id: Uuid, mut game: G, seed: u64) -> Self {
        let mut rng = DeterministicRng::new(seed);
        game.reset(&mut rng);

        debug!(
            session = %hex::encode(id.as_bytes()),
            game = game.kind().slug(),
            seed = %hex::encode(seed.to_le_bytes()),
            "Session created"
        );

        Self {
            id,
            game,
            phase: Phase::Idle,
            rng,
            seed,
            tick: 0,
            high_score: 0,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    pub fn score(&self) -> u32 {
        self.game.score()
    }

    /// Best score across play-throughs of this session.
    pub fn high_score(&self) -> u32 {
        self.high_score.max(self.game.score())
    }

    pub fn tick_period(&self) -> Duration {
        self.game.tick_period()
    }

    /// Whether the tick timer should be running.
    pub fn is_ticking(&self) -> bool {
        self.phase.is_running()
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    /// Mutable access to the game, bypassing the phase machine.
    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            phase: self.phase,
            tick: self.tick,
            score: self.score(),
            high_score: self.high_score(),
        }
    }

    /// Drain events accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Idle -> Running
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.transition(Transition::Start)
    }

    /// Running -> Paused
    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.transition(Transition::Pause)
    }

    /// Paused -> Running
    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.transition(Transition::Resume)
    }

    /// Any -> Idle, with the game re-initialised.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        self.high_score = self.high_score();
        self.transition(Transition::Restart)?;
        self.game.reset(&mut self.rng);
        self.tick = 0;
        Ok(())
    }

    /// Advance one tick.
    pub fn tick(&mut self) -> Result<TickResult, SessionError> {
        if !self.phase.is_running() {
            return Err(SessionError::NotRunning(self.phase));
        }

        self.tick += 1;
        let mut ctx = TickContext {
            tick: self.tick,
            rng: &mut self.rng,
        };
        let result = self.game.tick(&mut ctx);
        self.absorb(&result);

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(tick = self.tick, events = result.events.len(), "Tick");

        Ok(result)
    }

    /// Translate and apply a raw input event.
    ///
    /// Ignored (empty result) unless Running or when the event has no
    /// meaning for this game.
    pub fn handle_input(&mut self, event: &InputEvent) -> TickResult {
        if !self.phase.is_running() {
            debug!(phase = %self.phase, ?event, "Input ignored");
            return TickResult::none();
        }

        let Some(intent) = self.game.translate(event) else {
            debug!(?event, "Input has no intent");
            return TickResult::none();
        };

        let mut ctx = TickContext {
            tick: self.tick,
            rng: &mut self.rng,
        };
        let result = self.game.apply(intent, &mut ctx);
        self.absorb(&result);
        result
    }

    /// Draw the current state with the phase banner on top.
    pub fn render(&self) -> Frame {
        let (width, height) = self.game.canvas_size();
        let mut frame = Frame::new(width, height);
        self.game.render(&mut frame);
        frame.phase_banner(self.phase, self.score());
        frame
    }

    fn absorb(&mut self, result: &TickResult) {
        self.events.extend(result.events.iter().cloned());

        if let Some(outcome) = result.outcome {
            let old = self.phase;
            self.phase = outcome.into();
            self.high_score = self.high_score();

            let score = self.score();
            self.events.push(GameEvent::phase_changed(self.tick, old, self.phase));
            self.events.push(GameEvent::game_ended(self.tick, outcome, score));

            info!(
                session = %hex::encode(self.id.as_bytes()),
                game = self.game.kind().slug(),
                ?outcome,
                score,
                tick = self.tick,
                "Session ended"
            );
        }
    }

    fn transition(&mut self, transition: Transition) -> Result<(), SessionError> {
        let old = self.phase;
        let new = old
            .apply(transition)
            .ok_or(SessionError::InvalidTransition { from: old, transition })?;

        self.phase = new;
        self.events.push(GameEvent::phase_changed(self.tick, old, new));

        info!(
            session = %hex::encode(self.id.as_bytes()),
            game = self.game.kind().slug(),
            from = %old,
            to = %new,
            "Phase changed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEventData;
    use crate::game::input::Key;
    use crate::game::render::Color;

    /// Counts ticks; Jump scores a point; ends Won at 3 points, Over at tick 100.
    struct Counter {
        points: u32,
        resets: u32,
    }

    impl Game for Counter {
        fn kind(&self) -> GameKind {
            GameKind::Dino
        }

        fn tick_period(&self) -> Duration {
            Duration::from_millis(16)
        }

        fn reset(&mut self, _rng: &mut DeterministicRng) {
            self.points = 0;
            self.resets += 1;
        }

        fn translate(&mut self, event: &InputEvent) -> Option<Intent> {
            match event {
                InputEvent::KeyDown { key: Key::Space } => Some(Intent::Jump),
                _ => None,
            }
        }

        fn apply(&mut self, intent: Intent, ctx: &mut TickContext<'_>) -> TickResult {
            let mut result = TickResult::none();
            if intent == Intent::Jump {
                self.points += 1;
                result.push(GameEvent::score_changed(ctx.tick, self.points));
                if self.points >= 3 {
                    result.finish(Outcome::Won);
                }
            }
            result
        }

        fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
            if ctx.tick >= 100 {
                TickResult::finished(Outcome::Over)
            } else {
                TickResult::none()
            }
        }

        fn render(&self, frame: &mut Frame) {
            frame.clear(Color::BLACK);
        }

        fn canvas_size(&self) -> (f32, f32) {
            (100.0, 100.0)
        }

        fn score(&self) -> u32 {
            self.points
        }
    }

    fn session() -> Session<Counter> {
        Session::with_seed(Uuid::nil(), Counter { points: 0, resets: 0 }, 7)
    }

    const SPACE: InputEvent = InputEvent::KeyDown { key: Key::Space };

    #[test]
    fn test_new_session_is_idle_and_reset() {
        let s = session();
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.game().resets, 1);
        assert!(!s.is_ticking());
    }

    #[test]
    fn test_tick_requires_running() {
        let mut s = session();
        assert_eq!(s.tick(), Err(SessionError::NotRunning(Phase::Idle)));

        s.start().unwrap();
        assert!(s.tick().is_ok());
        assert_eq!(s.current_tick(), 1);

        s.pause().unwrap();
        assert_eq!(s.tick(), Err(SessionError::NotRunning(Phase::Paused)));
        assert_eq!(s.current_tick(), 1);
    }

    #[test]
    fn test_input_ignored_unless_running() {
        let mut s = session();
        s.handle_input(&SPACE);
        assert_eq!(s.score(), 0);

        s.start().unwrap();
        s.handle_input(&SPACE);
        assert_eq!(s.score(), 1);

        s.pause().unwrap();
        s.handle_input(&SPACE);
        assert_eq!(s.score(), 1);
    }

    #[test]
    fn test_invalid_transition_leaves_phase() {
        let mut s = session();
        let err = s.pause().unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition { from: Phase::Idle, transition: Transition::Pause }
        );
        assert_eq!(s.phase(), Phase::Idle);

        s.start().unwrap();
        assert!(s.start().is_err());
        assert_eq!(s.phase(), Phase::Running);
    }

    #[test]
    fn test_outcome_from_input_ends_session() {
        let mut s = session();
        s.start().unwrap();
        for _ in 0..3 {
            s.handle_input(&SPACE);
        }
        assert_eq!(s.phase(), Phase::Won);
        assert!(!s.is_ticking());

        let events = s.take_events();
        assert!(events.iter().any(|e| e.is_terminal()));

        // Further input and ticks do nothing
        s.handle_input(&SPACE);
        assert_eq!(s.score(), 3);
        assert!(s.tick().is_err());
    }

    #[test]
    fn test_outcome_from_tick_ends_session() {
        let mut s = session();
        s.start().unwrap();
        while s.tick().is_ok() {}
        assert_eq!(s.phase(), Phase::Over);
        assert_eq!(s.current_tick(), 100);
    }

    #[test]
    fn test_restart_keeps_high_score() {
        let mut s = session();
        s.start().unwrap();
        s.handle_input(&SPACE);
        s.handle_input(&SPACE);
        s.pause().unwrap();

        s.restart().unwrap();
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.score(), 0);
        assert_eq!(s.high_score(), 2);
        assert_eq!(s.current_tick(), 0);
        assert_eq!(s.game().resets, 2);
    }

    #[test]
    fn test_phase_events_recorded() {
        let mut s = session();
        s.start().unwrap();
        s.pause().unwrap();

        let phases: Vec<(Phase, Phase)> = s
            .take_events()
            .into_iter()
            .filter_map(|e| match e.data {
                GameEventData::PhaseChanged { old_phase, new_phase } => Some((old_phase, new_phase)),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![(Phase::Idle, Phase::Running), (Phase::Running, Phase::Paused)]);
        assert!(s.take_events().is_empty());
    }

    #[test]
    fn test_render_banner_follows_phase() {
        let mut s = session();
        assert!(s.render().has_overlay());
        s.start().unwrap();
        assert!(!s.render().has_overlay());
    }

    #[test]
    fn test_seed_from_id_is_stable() {
        let id = Uuid::from_bytes([9; 16]);
        let a = Session::new(id, Counter { points: 0, resets: 0 });
        let b = Session::new(id, Counter { points: 0, resets: 0 });
        assert_eq!(a.seed(), b.seed());
    }
}
