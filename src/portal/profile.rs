//! Profile Context
//!
//! The signed-in player's display profile, cached in a small JSON file so it
//! survives restarts. Loaded on launch, written on every change and removed
//! on logout.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::portal::store::User;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub avatar: u32,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone().unwrap_or_default(),
            avatar: user.avatar,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("profile file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Profile state plus the file backing it.
#[derive(Debug)]
pub struct ProfileContext {
    path: PathBuf,
    profile: Option<UserProfile>,
}

impl ProfileContext {
    /// Load the cached profile, if any.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let path = path.into();
        let profile = match std::fs::read_to_string(&path) {
            Ok(text) => Some(
                serde_json::from_str(&text)
                    .map_err(|source| ProfileError::Json { path: path.clone(), source })?,
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => return Err(ProfileError::Io { path, source }),
        };

        debug!(path = %path.display(), loaded = profile.is_some(), "Profile context loaded");
        Ok(Self { path, profile })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Replace the profile and persist it.
    pub fn set_profile(&mut self, profile: UserProfile) -> Result<(), ProfileError> {
        self.profile = Some(profile);
        self.persist()
    }

    /// Change the avatar of the current profile. No-op without a profile.
    pub fn update_avatar(&mut self, avatar: u32) -> Result<bool, ProfileError> {
        match self.profile.as_mut() {
            Some(profile) => {
                profile.avatar = avatar;
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forget the profile (logout).
    pub fn clear(&mut self) -> Result<(), ProfileError> {
        self.profile = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ProfileError::Io { path: self.path.clone(), source });
            }
        }
        info!("Profile cleared");
        Ok(())
    }

    fn persist(&self) -> Result<(), ProfileError> {
        let Some(profile) = &self.profile else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(profile)
            .map_err(|source| ProfileError::Json { path: self.path.clone(), source })?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|source| ProfileError::Io { path: self.path.clone(), source })?;
        }
        std::fs::write(&self.path, json)
            .map_err(|source| ProfileError::Io { path: self.path.clone(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("arcade-profile-{}", uuid::Uuid::new_v4()))
            .join("profile.json")
    }

    fn ada() -> UserProfile {
        UserProfile {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: String::new(),
            avatar: 2,
        }
    }

    #[test]
    fn test_missing_file_is_signed_out() {
        let ctx = ProfileContext::load(scratch_path()).unwrap();
        assert!(ctx.profile().is_none());
    }

    #[test]
    fn test_persist_and_reload() {
        let path = scratch_path();
        let mut ctx = ProfileContext::load(&path).unwrap();
        ctx.set_profile(ada()).unwrap();

        let reloaded = ProfileContext::load(&path).unwrap();
        assert_eq!(reloaded.profile(), Some(&ada()));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"firstName\""));
    }

    #[test]
    fn test_update_avatar() {
        let path = scratch_path();
        let mut ctx = ProfileContext::load(&path).unwrap();
        assert!(!ctx.update_avatar(5).unwrap());

        ctx.set_profile(ada()).unwrap();
        assert!(ctx.update_avatar(5).unwrap());

        let reloaded = ProfileContext::load(&path).unwrap();
        assert_eq!(reloaded.profile().map(|p| p.avatar), Some(5));
    }

    #[test]
    fn test_clear_removes_file() {
        let path = scratch_path();
        let mut ctx = ProfileContext::load(&path).unwrap();
        ctx.set_profile(ada()).unwrap();

        ctx.clear().unwrap();
        assert!(ctx.profile().is_none());
        assert!(!path.exists());

        // Clearing twice is fine
        ctx.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(ProfileContext::load(&path), Err(ProfileError::Json { .. })));
    }

    #[test]
    fn test_from_user() {
        let user = User {
            id: 1,
            email: "ada@example.com".into(),
            password: None,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            phone: None,
            avatar: 2,
            firebase_uid: Some("uid-ada".into()),
            created_at: chrono::Utc::now(),
        };
        assert_eq!(UserProfile::from(&user), ada());
    }
}
