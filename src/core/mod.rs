//! Core primitives.
//!
//! Geometry and seeded randomness shared by every game.

pub mod vec2;
pub mod rng;

// Re-export core types
pub use vec2::{Vec2, Rect};
pub use rng::{DeterministicRng, derive_session_seed};
