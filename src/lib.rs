//! # Arcade Portal
//!
//! Headless game sessions for the portal's ten games, plus the WebSocket
//! host that drives them for browser clients.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ARCADE PORTAL                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── vec2.rs     - 2D vectors and rectangles                 │
//! │  └── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │                                                              │
//! │  game/           - Session framework                         │
//! │  ├── phase.rs    - Idle/Running/Paused/Over/Won              │
//! │  ├── input.rs    - Raw events and intents                    │
//! │  ├── collision.rs- Box overlap, paddle spin, arc gaps         │
//! │  ├── render.rs   - Frames and draw commands                  │
//! │  ├── events.rs   - Game events                               │
//! │  └── session.rs  - Game trait and session state machine      │
//! │                                                              │
//! │  games/          - The ten games and their factory           │
//! │                                                              │
//! │  network/        - Game host                                 │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── session.rs  - Per-session tasks and timers              │
//! │  └── auth.rs     - ID token validation                       │
//! │                                                              │
//! │  portal/         - Config, profile context, score store      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/`, `game/` and `games/` never read the clock. Time enters only as
//! ticks from the session runtime, and randomness only from the session's
//! seeded RNG, so a session replays identically from its seed and inputs.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod games;
pub mod network;
pub mod portal;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::vec2::{Rect, Vec2};
pub use game::{Game, InputEvent, Outcome, Phase, Session, SessionError};
pub use games::{build_game, GameError, GameKind, GameOptions};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
