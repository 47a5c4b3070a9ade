//! Session Runtime
//!
//! Each open game runs in its own tokio task. The task owns the `Session`,
//! applies commands from an mpsc channel and publishes frames, events and
//! the final result on a broadcast channel.
//!
//! The tick timer exists only while the session is Running. Pausing or
//! reaching Over/Won drops it, so a stopped session never wakes up.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::game::input::InputEvent;
use crate::game::phase::{Outcome, Phase};
use crate::game::session::{Game, Session, SessionError, SessionStatus, TickResult};
use crate::games::{build_game, GameError, GameKind, GameOptions};
use crate::network::protocol::{EndedInfo, FrameUpdate, OpenedInfo, ServerMessage};
use crate::portal::store::{GameScore, InsertGameScore, MemStorage, StoreError, UserId};

/// Unique session identifier.
pub type SessionId = Uuid;

const COMMAND_BUFFER: usize = 64;
const UPDATE_BUFFER: usize = 128;

// =============================================================================
// COMMANDS
// =============================================================================

/// Lifecycle request from the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Start,
    Pause,
    Resume,
    Restart,
}

/// Messages into a running session task.
pub enum SessionCommand {
    Input(InputEvent),
    Control {
        control: Control,
        reply: oneshot::Sender<Result<Phase, SessionError>>,
    },
    Status(oneshot::Sender<SessionStatus>),
    /// Publish the current frame without advancing.
    Redraw,
    Close,
}

/// Errors seen by holders of a `SessionHandle`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("session {0} is closed")]
    Closed(SessionId),
}

// =============================================================================
// SCORE RECORDING
// =============================================================================

/// Writes finished play-throughs to the score store for one user.
#[derive(Clone)]
pub struct ScoreRecorder {
    store: Arc<MemStorage>,
    user_id: UserId,
}

impl ScoreRecorder {
    pub fn new(store: Arc<MemStorage>, user_id: UserId) -> Self {
        Self { store, user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub async fn record(&self, game: GameKind, score: u32) -> Result<GameScore, StoreError> {
        self.store
            .create_game_score(InsertGameScore {
                user_id: Some(self.user_id),
                game_type: game.slug().to_string(),
                score: i64::from(score),
            })
            .await
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable handle to a session task.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: SessionId,
    game: GameKind,
    tick_period: Duration,
    seed: u64,
    commands: mpsc::Sender<SessionCommand>,
    updates: broadcast::Sender<ServerMessage>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn game(&self) -> GameKind {
        self.game
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Payload of the `opened` message.
    pub fn opened_info(&self) -> OpenedInfo {
        OpenedInfo {
            session_id: self.id.to_string(),
            game: self.game,
            tick_ms: self.tick_period.as_millis() as u64,
            seed: hex::encode(self.seed.to_le_bytes()),
        }
    }

    /// Receive frames, events and the final result from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.updates.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub async fn input(&self, event: InputEvent) -> Result<(), RuntimeError> {
        self.send(SessionCommand::Input(event)).await
    }

    pub async fn start(&self) -> Result<Phase, RuntimeError> {
        self.control(Control::Start).await
    }

    pub async fn pause(&self) -> Result<Phase, RuntimeError> {
        self.control(Control::Pause).await
    }

    pub async fn resume(&self) -> Result<Phase, RuntimeError> {
        self.control(Control::Resume).await
    }

    pub async fn restart(&self) -> Result<Phase, RuntimeError> {
        self.control(Control::Restart).await
    }

    /// Apply a lifecycle request and return the new phase.
    pub async fn control(&self, control: Control) -> Result<Phase, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Control { control, reply }).await?;
        let phase = rx.await.map_err(|_| RuntimeError::Closed(self.id))??;
        Ok(phase)
    }

    pub async fn status(&self) -> Result<SessionStatus, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Status(reply)).await?;
        rx.await.map_err(|_| RuntimeError::Closed(self.id))
    }

    /// Have the task publish its current frame, e.g. for a new subscriber.
    pub async fn redraw(&self) -> Result<(), RuntimeError> {
        self.send(SessionCommand::Redraw).await
    }

    /// Ask the task to stop. Idempotent.
    pub async fn close(&self) {
        let _ = self.commands.send(SessionCommand::Close).await;
    }

    async fn send(&self, command: SessionCommand) -> Result<(), RuntimeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RuntimeError::Closed(self.id))
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Spawn a task driving `session`. The task returns the session once closed.
pub fn spawn_session<G: Game + 'static>(
    session: Session<G>,
    recorder: Option<ScoreRecorder>,
) -> (SessionHandle, JoinHandle<Session<G>>) {
    let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
    let (updates, _) = broadcast::channel(UPDATE_BUFFER);

    let handle = SessionHandle {
        id: session.id(),
        game: session.game().kind(),
        tick_period: session.tick_period(),
        seed: session.seed(),
        commands,
        updates: updates.clone(),
    };

    let task = tokio::spawn(run_session(session, rx, updates, recorder));
    (handle, task)
}

#[instrument(skip_all, fields(session = %hex::encode(session.id().as_bytes()), game = session.game().kind().slug()))]
async fn run_session<G: Game>(
    mut session: Session<G>,
    mut commands: mpsc::Receiver<SessionCommand>,
    updates: broadcast::Sender<ServerMessage>,
    recorder: Option<ScoreRecorder>,
) -> Session<G> {
    let mut timer: Option<Interval> = None;

    loop {
        if session.is_ticking() {
            if timer.is_none() {
                timer = Some(tick_timer(session.tick_period()));
                debug!(period_ms = session.tick_period().as_millis() as u64, "Timer started");
            }
        } else if timer.take().is_some() {
            debug!(phase = %session.phase(), "Timer stopped");
        }

        let result = tokio::select! {
            command = commands.recv() => {
                match command {
                    None | Some(SessionCommand::Close) => break,
                    Some(SessionCommand::Input(event)) => {
                        let result = session.handle_input(&event);
                        if session.phase().is_running() || result.outcome.is_some() {
                            publish(&mut session, &updates);
                        }
                        result
                    }
                    Some(SessionCommand::Control { control, reply }) => {
                        let outcome = match control {
                            Control::Start => session.start(),
                            Control::Pause => session.pause(),
                            Control::Resume => session.resume(),
                            Control::Restart => session.restart(),
                        };
                        match &outcome {
                            Ok(()) => {
                                info!(?control, phase = %session.phase(), "Lifecycle");
                                publish(&mut session, &updates);
                            }
                            Err(e) => debug!(?control, error = %e, "Lifecycle rejected"),
                        }
                        let _ = reply.send(outcome.map(|()| session.phase()));
                        continue;
                    }
                    Some(SessionCommand::Status(reply)) => {
                        let _ = reply.send(session.status());
                        continue;
                    }
                    Some(SessionCommand::Redraw) => {
                        publish(&mut session, &updates);
                        continue;
                    }
                }
            }
            _ = next_tick(&mut timer) => {
                match session.tick() {
                    Ok(result) => {
                        publish(&mut session, &updates);
                        result
                    }
                    Err(e) => {
                        debug!(error = %e, "Stale tick");
                        continue;
                    }
                }
            }
        };

        if let Some((game, outcome, score)) = announce(&session, &result, &updates) {
            if let Some(recorder) = &recorder {
                record(recorder, game, outcome, score).await;
            }
        }
    }

    info!(tick = session.current_tick(), "Session closed");
    session
}

fn tick_timer(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Broadcast pending events and the current frame.
fn publish<G: Game>(session: &mut Session<G>, updates: &broadcast::Sender<ServerMessage>) {
    let tick = session.current_tick();
    let events = session.take_events();
    if !events.is_empty() {
        let _ = updates.send(ServerMessage::Events { tick, events });
    }
    let _ = updates.send(ServerMessage::Frame(FrameUpdate {
        tick,
        phase: session.phase(),
        score: session.score(),
        frame: session.render(),
    }));
}

/// Announce a finished play-through. Returns what should be recorded.
fn announce<G: Game>(
    session: &Session<G>,
    result: &TickResult,
    updates: &broadcast::Sender<ServerMessage>,
) -> Option<(GameKind, Outcome, u32)> {
    let outcome = result.outcome?;

    let score = session.score();
    info!(?outcome, score, tick = session.current_tick(), "Game ended");
    let _ = updates.send(ServerMessage::Ended(EndedInfo {
        outcome,
        score,
        high_score: session.high_score(),
    }));

    Some((session.game().kind(), outcome, score))
}

async fn record(recorder: &ScoreRecorder, game: GameKind, outcome: Outcome, score: u32) {
    match recorder.record(game, score).await {
        Ok(entry) => debug!(user = recorder.user_id, score_id = entry.id, ?outcome, "Score recorded"),
        Err(e) => warn!(user = recorder.user_id, error = %e, "Failed to record score"),
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Open sessions by id.
pub struct SessionManager {
    sessions: RwLock<BTreeMap<SessionId, SessionHandle>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build a game and spawn its session task. The session starts Idle.
    pub async fn open(
        &self,
        kind: GameKind,
        options: &GameOptions,
        recorder: Option<ScoreRecorder>,
    ) -> Result<SessionHandle, GameError> {
        let game = build_game(kind, options)?;
        let session = Session::new(Uuid::new_v4(), game);
        let (handle, _task) = spawn_session(session, recorder);

        self.sessions.write().await.insert(handle.id(), handle.clone());
        info!(
            session = %hex::encode(handle.id().as_bytes()),
            game = kind.slug(),
            mode = ?options.mode,
            "Session opened"
        );
        Ok(handle)
    }

    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Stop and forget a session. Returns false if it was unknown.
    pub async fn close(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(handle) => {
                handle.close().await;
                true
            }
            None => false,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Forget sessions whose task has exited.
    pub async fn cleanup(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| !handle.is_closed());
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Cleaned up closed sessions");
        }
        removed
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::phase::Transition;
    use crate::games::flappy::FlappyBird;
    use crate::games::snake::Snake;
    use crate::games::tictactoe::TicTacToe;
    use crate::games::Opponent;
    use crate::portal::store::InsertUser;
    use tokio::time::sleep;

    const SNAKE_PERIOD: Duration = Duration::from_millis(150);

    fn snake_session() -> (SessionHandle, JoinHandle<Session<Snake>>) {
        spawn_session(Session::with_seed(Uuid::new_v4(), Snake::new(), 7), None)
    }

    async fn tick_of(handle: &SessionHandle) -> u32 {
        handle.status().await.unwrap().tick
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_does_not_tick() {
        let (handle, _task) = snake_session();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(tick_of(&handle).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_follows_phase() {
        let (handle, _task) = snake_session();
        assert_eq!(handle.tick_period(), SNAKE_PERIOD);

        assert_eq!(handle.start().await.unwrap(), Phase::Running);
        sleep(SNAKE_PERIOD * 4 + SNAKE_PERIOD / 2).await;
        assert_eq!(tick_of(&handle).await, 4);

        assert_eq!(handle.pause().await.unwrap(), Phase::Paused);
        sleep(Duration::from_secs(3)).await;
        assert_eq!(tick_of(&handle).await, 4);

        assert_eq!(handle.resume().await.unwrap(), Phase::Running);
        sleep(SNAKE_PERIOD * 2 + SNAKE_PERIOD / 2).await;
        assert_eq!(tick_of(&handle).await, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_transition_reported() {
        let (handle, _task) = snake_session();

        let err = handle.pause().await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Session(SessionError::InvalidTransition {
                from: Phase::Idle,
                transition: Transition::Pause,
            })
        ));
        assert_eq!(handle.status().await.unwrap().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_broadcast_after_start() {
        let (handle, _task) = snake_session();
        let mut updates = handle.subscribe();

        handle.start().await.unwrap();
        match updates.recv().await.unwrap() {
            ServerMessage::Frame(update) => {
                assert_eq!(update.phase, Phase::Running);
                assert_eq!(update.tick, 0);
            }
            other => panic!("expected frame, got {:?}", other),
        }

        sleep(SNAKE_PERIOD + SNAKE_PERIOD / 2).await;
        let mut saw_tick = false;
        while let Ok(msg) = updates.try_recv() {
            if let ServerMessage::Frame(update) = msg {
                saw_tick |= update.tick == 1;
            }
        }
        assert!(saw_tick);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redraw_publishes_idle_frame() {
        let (handle, _task) = snake_session();
        let mut updates = handle.subscribe();

        handle.redraw().await.unwrap();
        match updates.recv().await.unwrap() {
            ServerMessage::Frame(update) => assert_eq!(update.phase, Phase::Idle),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_returns_session() {
        let (handle, task) = snake_session();
        handle.start().await.unwrap();
        sleep(SNAKE_PERIOD * 2 + SNAKE_PERIOD / 2).await;

        handle.close().await;
        let session = task.await.unwrap();
        assert_eq!(session.current_tick(), 2);
        assert!(handle.is_closed());
        assert!(matches!(handle.start().await, Err(RuntimeError::Closed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_state_stops_timer() {
        let session = Session::with_seed(Uuid::new_v4(), FlappyBird::new(), 11);
        let (handle, _task) = spawn_session(session, None);
        let mut updates = handle.subscribe();

        // No flaps: the bird falls until it hits the ground
        handle.start().await.unwrap();
        let ended = loop {
            if let ServerMessage::Ended(info) = updates.recv().await.unwrap() {
                break info;
            }
        };
        assert_eq!(ended.outcome, Outcome::Over);

        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Over);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.status().await.unwrap().tick, status.tick);

        assert_eq!(handle.restart().await.unwrap(), Phase::Idle);
        assert_eq!(handle.status().await.unwrap().tick, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_ending_game_records_score() {
        let store = Arc::new(MemStorage::new());
        let user = store
            .create_user(InsertUser {
                email: "ada@example.com".into(),
                first_name: "Ada".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let session = Session::new(Uuid::new_v4(), TicTacToe::new(Opponent::Local));
        let recorder = ScoreRecorder::new(Arc::clone(&store), user.id);
        let (handle, _task) = spawn_session(session, Some(recorder));
        let mut updates = handle.subscribe();

        handle.start().await.unwrap();
        for (row, col) in [(0, 0), (1, 0), (0, 1), (1, 1), (0, 2)] {
            handle.input(InputEvent::CellClick { row, col }).await.unwrap();
        }

        let ended = loop {
            if let ServerMessage::Ended(info) = updates.recv().await.unwrap() {
                break info;
            }
        };
        assert_eq!(ended.outcome, Outcome::Won);
        assert_eq!(ended.score, 1);

        // The score is written before the next command is served
        assert_eq!(handle.status().await.unwrap().phase, Phase::Won);
        let scores = store.get_user_game_scores(user.id).await;
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].game_type, "tic-tac-toe");
        assert_eq!(scores[0].score, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_open_get_close() {
        let manager = SessionManager::new();
        let handle = manager
            .open(GameKind::Pong, &GameOptions::default(), None)
            .await
            .unwrap();

        assert_eq!(manager.session_count().await, 1);
        assert!(manager.get(&handle.id()).await.is_some());
        assert_eq!(handle.opened_info().game, GameKind::Pong);

        assert!(manager.close(&handle.id()).await);
        assert!(!manager.close(&handle.id()).await);
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_rejects_bad_mode() {
        let manager = SessionManager::new();
        let err = manager
            .open(GameKind::Snake, &GameOptions::with_mode("hard"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidMode { .. }));
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_cleanup() {
        let manager = SessionManager::new();
        let handle = manager
            .open(GameKind::Dino, &GameOptions::default(), None)
            .await
            .unwrap();

        handle.close().await;
        // Let the task observe the close
        sleep(Duration::from_millis(1)).await;

        assert_eq!(manager.cleanup().await, 1);
        assert_eq!(manager.session_count().await, 0);
    }
}
