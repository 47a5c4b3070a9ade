//! User and Score Store
//!
//! In-memory implementation of the portal's CRUD contract for users and game
//! scores. Records serialize with camelCase field names, matching what the
//! web client sends and expects.
//!
//! Writes are last-write-wins under one `RwLock`; deleting a user removes
//! their scores under the same write guard. Nothing is persisted.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

pub type UserId = u32;
pub type ScoreId = u32;

/// Default number of entries returned by `get_game_high_scores`.
pub const DEFAULT_HIGH_SCORE_LIMIT: usize = 10;

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub avatar: u32,
    #[serde(default)]
    pub firebase_uid: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating a user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertUser {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Defaults to 1
    #[serde(default)]
    pub avatar: Option<u32>,
    #[serde(default)]
    pub firebase_uid: Option<String>,
}

/// Partial user update; `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<u32>,
    pub firebase_uid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameScore {
    pub id: ScoreId,
    pub user_id: Option<UserId>,
    /// Game slug, e.g. `snake-game`
    pub game_type: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertGameScore {
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub game_type: String,
    pub score: i64,
}

// =============================================================================
// ERRORS
// =============================================================================

/// One rejected field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("validation error: {}", join_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u32 },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Advance a serial id counter.
fn next_id(last: &mut u32, entity: &str) -> Result<u32, StoreError> {
    let id = last
        .checked_add(1)
        .ok_or_else(|| StoreError::Internal(format!("{entity} ids exhausted")))?;
    *last = id;
    Ok(id)
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl StoreError {
    /// HTTP status code the error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::Validation(_) => 400,
            StoreError::NotFound { .. } => 404,
            StoreError::Internal(_) => 500,
        }
    }

    /// Field errors for a validation failure, empty otherwise.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            StoreError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

fn validate_email(email: &str, errors: &mut Vec<FieldError>) {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        errors.push(FieldError::new("email", "must be a valid email address"));
    }
}

fn validate_first_name(name: &str, errors: &mut Vec<FieldError>) {
    if name.trim().is_empty() {
        errors.push(FieldError::new("firstName", "must not be empty"));
    }
}

fn validate_avatar(avatar: u32, errors: &mut Vec<FieldError>) {
    if avatar == 0 {
        errors.push(FieldError::new("avatar", "must be at least 1"));
    }
}

fn into_result(errors: Vec<FieldError>) -> Result<(), StoreError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(errors))
    }
}

// =============================================================================
// STORAGE
// =============================================================================

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    scores: BTreeMap<ScoreId, GameScore>,
    last_user_id: UserId,
    last_score_id: ScoreId,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn uid_taken(&self, uid: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.firebase_uid.as_deref() == Some(uid) && Some(u.id) != except)
    }
}

/// In-memory user and score store.
#[derive(Default)]
pub struct MemStorage {
    tables: RwLock<Tables>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    pub async fn get_user(&self, id: UserId) -> Option<User> {
        self.tables.read().await.users.get(&id).cloned()
    }

    pub async fn get_user_by_email(&self, email: &str) -> Option<User> {
        let tables = self.tables.read().await;
        tables.users.values().find(|u| u.email == email).cloned()
    }

    pub async fn get_user_by_firebase_uid(&self, uid: &str) -> Option<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|u| u.firebase_uid.as_deref() == Some(uid))
            .cloned()
    }

    pub async fn create_user(&self, insert: InsertUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;

        let avatar = insert.avatar.unwrap_or(1);
        let mut errors = Vec::new();
        validate_email(&insert.email, &mut errors);
        validate_first_name(&insert.first_name, &mut errors);
        validate_avatar(avatar, &mut errors);
        if tables.email_taken(&insert.email, None) {
            errors.push(FieldError::new("email", "already registered"));
        }
        if let Some(uid) = insert.firebase_uid.as_deref() {
            if tables.uid_taken(uid, None) {
                errors.push(FieldError::new("firebaseUid", "already linked to another user"));
            }
        }
        into_result(errors)?;

        let id = next_id(&mut tables.last_user_id, "user")?;
        let user = User {
            id,
            email: insert.email,
            password: insert.password,
            first_name: insert.first_name,
            last_name: insert.last_name,
            phone: insert.phone,
            avatar,
            firebase_uid: insert.firebase_uid,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());

        debug!(user_id = user.id, "User created");
        Ok(user)
    }

    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Err(StoreError::NotFound { entity: "user", id });
        }

        let mut errors = Vec::new();
        if let Some(email) = update.email.as_deref() {
            validate_email(email, &mut errors);
            if tables.email_taken(email, Some(id)) {
                errors.push(FieldError::new("email", "already registered"));
            }
        }
        if let Some(name) = update.first_name.as_deref() {
            validate_first_name(name, &mut errors);
        }
        if let Some(avatar) = update.avatar {
            validate_avatar(avatar, &mut errors);
        }
        if let Some(uid) = update.firebase_uid.as_deref() {
            if tables.uid_taken(uid, Some(id)) {
                errors.push(FieldError::new("firebaseUid", "already linked to another user"));
            }
        }
        into_result(errors)?;

        let user = tables
            .users
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "user", id })?;

        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(password) = update.password {
            user.password = Some(password);
        }
        if let Some(first_name) = update.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name;
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(avatar) = update.avatar {
            user.avatar = avatar;
        }
        if let Some(uid) = update.firebase_uid {
            user.firebase_uid = Some(uid);
        }

        Ok(user.clone())
    }

    /// Delete a user and all of their scores.
    pub async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(StoreError::NotFound { entity: "user", id });
        }

        let before = tables.scores.len();
        tables.scores.retain(|_, s| s.user_id != Some(id));
        debug!(user_id = id, scores_removed = before - tables.scores.len(), "User deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Scores
    // -------------------------------------------------------------------------

    pub async fn create_game_score(&self, insert: InsertGameScore) -> Result<GameScore, StoreError> {
        let mut tables = self.tables.write().await;

        let mut errors = Vec::new();
        if insert.game_type.trim().is_empty() {
            errors.push(FieldError::new("gameType", "must not be empty"));
        }
        if insert.score < 0 {
            errors.push(FieldError::new("score", "must not be negative"));
        }
        if let Some(user_id) = insert.user_id {
            if !tables.users.contains_key(&user_id) {
                errors.push(FieldError::new("userId", "unknown user"));
            }
        }
        into_result(errors)?;

        let id = next_id(&mut tables.last_score_id, "score")?;
        let score = GameScore {
            id,
            user_id: insert.user_id,
            game_type: insert.game_type,
            score: insert.score,
            created_at: Utc::now(),
        };
        tables.scores.insert(score.id, score.clone());
        Ok(score)
    }

    /// All of a user's scores, newest first.
    pub async fn get_user_game_scores(&self, user_id: UserId) -> Vec<GameScore> {
        let tables = self.tables.read().await;
        let mut scores: Vec<GameScore> = tables
            .scores
            .values()
            .filter(|s| s.user_id == Some(user_id))
            .cloned()
            .collect();
        // Ids break timestamp ties
        scores.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        scores
    }

    /// Best scores for one game, highest first, at most `limit`
    /// (default [`DEFAULT_HIGH_SCORE_LIMIT`]).
    pub async fn get_game_high_scores(&self, game_type: &str, limit: Option<usize>) -> Vec<GameScore> {
        let tables = self.tables.read().await;
        let mut scores: Vec<GameScore> = tables
            .scores
            .values()
            .filter(|s| s.game_type == game_type)
            .cloned()
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        scores.truncate(limit.unwrap_or(DEFAULT_HIGH_SCORE_LIMIT));
        scores
    }

    /// A user's scores for one game, highest first.
    pub async fn get_user_game_scores_by_type(&self, user_id: UserId, game_type: &str) -> Vec<GameScore> {
        let tables = self.tables.read().await;
        let mut scores: Vec<GameScore> = tables
            .scores
            .values()
            .filter(|s| s.user_id == Some(user_id) && s.game_type == game_type)
            .cloned()
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        scores
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> InsertUser {
        InsertUser {
            email: "alice@example.com".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            firebase_uid: Some("uid-alice".into()),
            ..Default::default()
        }
    }

    fn score(user_id: Option<UserId>, game: &str, value: i64) -> InsertGameScore {
        InsertGameScore {
            user_id,
            game_type: game.into(),
            score: value,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let store = MemStorage::new();
        let user = store.create_user(alice()).await.unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(user.avatar, 1);
        assert_eq!(store.get_user(1).await, Some(user.clone()));
        assert_eq!(store.get_user_by_email("alice@example.com").await, Some(user.clone()));
        assert_eq!(store.get_user_by_firebase_uid("uid-alice").await, Some(user));
        assert_eq!(store.get_user(2).await, None);
    }

    #[tokio::test]
    async fn test_ids_are_serial() {
        let store = MemStorage::new();
        let a = store.create_user(alice()).await.unwrap();
        let b = store
            .create_user(InsertUser {
                email: "bob@example.com".into(),
                first_name: "Bob".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!((a.id, b.id), (1, 2));
    }

    #[tokio::test]
    async fn test_validation_maps_to_400() {
        let store = MemStorage::new();
        let err = store
            .create_user(InsertUser {
                email: "not-an-email".into(),
                first_name: " ".into(),
                avatar: Some(0),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "firstName", "avatar"]);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemStorage::new();
        store.create_user(alice()).await.unwrap();
        let err = store
            .create_user(InsertUser {
                firebase_uid: None,
                ..alice()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_partial_update() {
        let store = MemStorage::new();
        let user = store.create_user(alice()).await.unwrap();

        let updated = store
            .update_user(user.id, UserUpdate {
                avatar: Some(4),
                phone: Some("555-0100".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.avatar, 4);
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.first_name, "Alice");
        assert_eq!(updated.created_at, user.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_user_is_404() {
        let store = MemStorage::new();
        let err = store.update_user(9, UserUpdate::default()).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound { entity: "user", id: 9 });
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_exhausted_ids_map_to_500() {
        let store = MemStorage::new();
        store.tables.write().await.last_score_id = ScoreId::MAX;

        let err = store.create_game_score(score(None, "pong", 3)).await.unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)));
        assert_eq!(err.status_code(), 500);
        assert!(store.get_game_high_scores("pong", None).await.is_empty());

        // Users have their own counter
        assert_eq!(store.create_user(alice()).await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_user_unchanged() {
        let store = MemStorage::new();
        let user = store.create_user(alice()).await.unwrap();

        let err = store
            .update_user(user.id, UserUpdate {
                email: Some("broken".into()),
                last_name: Some("Changed".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(store.get_user(user.id).await, Some(user));
    }

    #[tokio::test]
    async fn test_delete_cascades_scores() {
        let store = MemStorage::new();
        let a = store.create_user(alice()).await.unwrap();
        store.create_game_score(score(Some(a.id), "pong", 5)).await.unwrap();
        store.create_game_score(score(Some(a.id), "snake-game", 40)).await.unwrap();
        store.create_game_score(score(None, "pong", 3)).await.unwrap();

        store.delete_user(a.id).await.unwrap();

        assert_eq!(store.get_user(a.id).await, None);
        assert!(store.get_user_game_scores(a.id).await.is_empty());
        assert_eq!(store.get_game_high_scores("pong", None).await.len(), 1);

        let err = store.delete_user(a.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_high_scores_sorted_and_limited() {
        let store = MemStorage::new();
        for value in [30, 120, 70, 10, 90, 50, 110, 20, 60, 100, 80, 40] {
            store.create_game_score(score(None, "breakout", value)).await.unwrap();
        }
        store.create_game_score(score(None, "pong", 999)).await.unwrap();

        let top = store.get_game_high_scores("breakout", None).await;
        let values: Vec<i64> = top.iter().map(|s| s.score).collect();
        assert_eq!(values, vec![120, 110, 100, 90, 80, 70, 60, 50, 40, 30]);

        let top3 = store.get_game_high_scores("breakout", Some(3)).await;
        assert_eq!(top3.len(), 3);
        assert_eq!(top3[0].score, 120);
    }

    #[tokio::test]
    async fn test_user_scores_newest_first() {
        let store = MemStorage::new();
        let a = store.create_user(alice()).await.unwrap();
        for value in [1, 2, 3] {
            store.create_game_score(score(Some(a.id), "dino-run", value)).await.unwrap();
        }

        let scores = store.get_user_game_scores(a.id).await;
        let values: Vec<i64> = scores.iter().map(|s| s.score).collect();
        assert_eq!(values, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_user_scores_by_type_highest_first() {
        let store = MemStorage::new();
        let a = store.create_user(alice()).await.unwrap();
        store.create_game_score(score(Some(a.id), "flappy-bird", 4)).await.unwrap();
        store.create_game_score(score(Some(a.id), "flappy-bird", 9)).await.unwrap();
        store.create_game_score(score(Some(a.id), "pong", 5)).await.unwrap();

        let scores = store.get_user_game_scores_by_type(a.id, "flappy-bird").await;
        let values: Vec<i64> = scores.iter().map(|s| s.score).collect();
        assert_eq!(values, vec![9, 4]);
    }

    #[tokio::test]
    async fn test_score_validation() {
        let store = MemStorage::new();
        let err = store.create_game_score(score(Some(7), "", -1)).await.unwrap_err();
        assert_eq!(err.field_errors().len(), 3);
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_records_use_camel_case() {
        let json = serde_json::to_value(InsertGameScore {
            user_id: Some(1),
            game_type: "chess".into(),
            score: 3,
        })
        .unwrap();
        assert_eq!(json["userId"], 1);
        assert_eq!(json["gameType"], "chess");

        let insert: InsertUser = serde_json::from_str(
            r#"{"email":"a@b.co","firstName":"A","lastName":"B","firebaseUid":"u1"}"#,
        )
        .unwrap();
        assert_eq!(insert.firebase_uid.as_deref(), Some("u1"));
        assert_eq!(insert.avatar, None);
    }
}
