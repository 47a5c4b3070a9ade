//! Protocol Messages
//!
//! Wire format between the browser and the game host over WebSocket.
//! Every message is a JSON object tagged by `type`.

use serde::{Serialize, Deserialize};

use crate::game::events::GameEvent;
use crate::game::input::InputEvent;
use crate::game::phase::{Outcome, Phase};
use crate::game::render::Frame;
use crate::games::{GameKind, GameOptions};
use crate::portal::profile::UserProfile;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Present the identity provider's ID token.
    Auth { token: String },

    /// Open a game session. Replaces any session already open on this connection.
    Open(OpenRequest),

    /// Raw device input for the open session.
    Input { event: InputEvent },

    Start,
    Pause,
    Resume,
    Restart,

    /// Close the open session.
    Close,

    /// Pick a new avatar for the signed-in player.
    SetAvatar { avatar: u32 },

    /// Sign out: closes the session and forgets the cached profile.
    Logout,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

/// Which game to open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub game: GameKind,
    #[serde(default)]
    pub options: GameOptions,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthResult(AuthResult),

    /// Session created and idle.
    Opened(OpenedInfo),

    /// Latest rendered frame.
    Frame(FrameUpdate),

    /// Game events produced since the last message.
    Events { tick: u32, events: Vec<GameEvent> },

    /// Session reached a terminal state.
    Ended(EndedInfo),

    /// Profile of the signed-in player, after sign-in or a change.
    Profile(UserProfile),

    LoggedOut,

    Pong { timestamp: u64, server_time: u64 },

    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Authentication result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResult {
    pub success: bool,
    /// Provider uid when successful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub server_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenedInfo {
    pub session_id: String,
    pub game: GameKind,
    /// Tick period in milliseconds.
    pub tick_ms: u64,
    /// Seed of the session's RNG, hex-encoded.
    pub seed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameUpdate {
    pub tick: u32,
    pub phase: Phase,
    pub score: u32,
    pub frame: Frame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndedInfo {
    pub outcome: Outcome,
    pub score: u32,
    pub high_score: u32,
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Host requires authentication and the client has none.
    Unauthorized,
    TokenExpired,
    InvalidToken,
    /// Unparseable message.
    InvalidMessage,
    UnknownGame,
    InvalidMode,
    /// No session is open on this connection.
    NoSession,
    /// Lifecycle command not allowed in the current phase.
    InvalidTransition,
    ServerOverloaded,
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError::new(code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::Key;

    #[test]
    fn test_open_from_browser_json() {
        let msg = ClientMessage::from_json(
            r#"{"type":"open","game":"ludo","options":{"mode":"2p-2cpu"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Open(OpenRequest {
                game: GameKind::Ludo,
                options: GameOptions::with_mode("2p-2cpu"),
            })
        );

        // Options are optional
        let msg = ClientMessage::from_json(r#"{"type":"open","game":"snake-game"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Open(OpenRequest { game: GameKind::Snake, .. })));
    }

    #[test]
    fn test_input_nests_event() {
        let msg = ClientMessage::Input {
            event: InputEvent::KeyDown { key: Key::ArrowLeft },
        };
        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"{"type":"input","event":{"kind":"key_down","key":"arrow_left"}}"#);
        assert_eq!(ClientMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_unit_commands() {
        for (json, expected) in [
            (r#"{"type":"start"}"#, ClientMessage::Start),
            (r#"{"type":"pause"}"#, ClientMessage::Pause),
            (r#"{"type":"resume"}"#, ClientMessage::Resume),
            (r#"{"type":"restart"}"#, ClientMessage::Restart),
            (r#"{"type":"close"}"#, ClientMessage::Close),
            (r#"{"type":"logout"}"#, ClientMessage::Logout),
            (r#"{"type":"set_avatar","avatar":4}"#, ClientMessage::SetAvatar { avatar: 4 }),
        ] {
            assert_eq!(ClientMessage::from_json(json).unwrap(), expected);
        }
    }

    #[test]
    fn test_unknown_game_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"open","game":"minesweeper"}"#).is_err());
    }

    #[test]
    fn test_auth_result_omits_empty_fields() {
        let msg = ServerMessage::AuthResult(AuthResult {
            success: true,
            uid: Some("uid-1".into()),
            error: None,
            server_version: "0.1.0".into(),
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"auth_result""#));
        assert!(json.contains(r#""uid":"uid-1""#));
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_ended_message() {
        let msg = ServerMessage::Ended(EndedInfo {
            outcome: Outcome::Won,
            score: 600,
            high_score: 600,
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""outcome":"won""#));
        assert_eq!(ServerMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_error_codes() {
        let json = ServerMessage::error(ErrorCode::Unauthorized, "sign in first")
            .to_json()
            .unwrap();
        assert!(json.contains(r#""code":"unauthorized""#));
    }
}
