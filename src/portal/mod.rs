//! Portal Services
//!
//! Process-wide configuration, the signed-in player's profile context and
//! the in-memory user/score store.

pub mod config;
pub mod profile;
pub mod store;

pub use config::{ConfigError, PortalConfig};
pub use profile::{ProfileContext, ProfileError, UserProfile};
pub use store::{
    FieldError, GameScore, InsertGameScore, InsertUser, MemStorage, StoreError, User, UserId,
    UserUpdate,
};
