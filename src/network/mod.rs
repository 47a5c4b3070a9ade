//! Network Layer
//!
//! WebSocket game host. Sessions run in their own tasks; this layer only
//! routes messages. All game rules live in `game/` and `games/`.

pub mod auth;
pub mod protocol;
pub mod session;
pub mod server;

pub use auth::{AuthConfig, TokenClaims, AuthError, validate_token};
pub use protocol::{ClientMessage, ServerMessage, ErrorCode, OpenRequest, FrameUpdate, EndedInfo};
pub use session::{
    Control, RuntimeError, ScoreRecorder, SessionHandle, SessionId, SessionManager, spawn_session,
};
pub use server::{GameServer, ServerConfig, GameServerError, provision_user};
