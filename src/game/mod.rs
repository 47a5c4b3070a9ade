//! Game Framework
//!
//! Everything the ten games share. Headless and deterministic given a seed.
//!
//! ## Module Structure
//!
//! - `phase`: Idle/Running/Paused/Over/Won lifecycle
//! - `input`: raw events, intents, boundary parsing
//! - `collision`: bounding-box and arc tests
//! - `render`: frames and draw commands
//! - `events`: events emitted by games and sessions
//! - `session`: the `Game` trait and the `Session` that drives it

pub mod phase;
pub mod input;
pub mod collision;
pub mod render;
pub mod events;
pub mod session;

// Re-export key types
pub use phase::{Phase, Outcome, Transition};
pub use input::{InputEvent, Intent, Key, Direction};
pub use render::{Frame, DrawCommand, Color};
pub use events::{GameEvent, GameEventData};
pub use session::{Game, Session, SessionError, SessionStatus, TickContext, TickResult};
