use crate::storage::{load_json, save_json};
use crate::user_models::{Session, User};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const USERS_FILE: &str = "users.json";
const SESSIONS_FILE: &str = "sessions.json";

#[derive(Debug, thiserror::Error)]
pub enum UserStorageError {
    #[error("Username already exists")]
    UsernameTaken,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct UserStorage {
    users_path: PathBuf,
    sessions_path: PathBuf,
    users: RwLock<Vec<User>>,
    sessions: RwLock<Vec<Session>>,
}

impl UserStorage {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let users_path = data_dir.join(USERS_FILE);
        let sessions_path = data_dir.join(SESSIONS_FILE);

        Ok(Self {
            users: RwLock::new(load_json(&users_path)?),
            sessions: RwLock::new(load_json(&sessions_path)?),
            users_path,
            sessions_path,
        })
    }

    pub async fn create_user(&self, user: User) -> Result<User, UserStorageError> {
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.username == user.username) {
            return Err(UserStorageError::UsernameTaken);
        }

        let mut next = users.clone();
        next.push(user.clone());
        save_json(&self.users_path, &next)?;

        *users = next;
        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == user_id).cloned())
    }

    /// Store a new session, dropping any that have already expired.
    pub async fn add_session(&self, session: Session) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();

        let mut next: Vec<Session> = sessions
            .iter()
            .filter(|s| !s.is_expired(now))
            .cloned()
            .collect();
        next.push(session.clone());
        save_json(&self.sessions_path, &next)?;

        *sessions = next;
        Ok(session)
    }

    /// The live session for `token_hash`, if any.
    pub async fn find_session(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .iter()
            .find(|s| s.token_hash == token_hash && !s.is_expired(now))
            .cloned())
    }

    pub async fn remove_session(&self, token_hash: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().await;

        if !sessions.iter().any(|s| s.token_hash == token_hash) {
            return Ok(false);
        }

        let next: Vec<Session> = sessions
            .iter()
            .filter(|s| s.token_hash != token_hash)
            .cloned()
            .collect();
        save_json(&self.sessions_path, &next)?;

        *sessions = next;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = UserStorage::open(dir.path()).unwrap();

        storage
            .create_user(User::new("ada".into(), "hash".into()))
            .await
            .unwrap();
        assert_matches!(
            storage.create_user(User::new("ada".into(), "other".into())).await,
            Err(UserStorageError::UsernameTaken)
        );
    }

    #[tokio::test]
    async fn expired_sessions_are_ignored_and_pruned() {
        let dir = TempDir::new().unwrap();
        let storage = UserStorage::open(dir.path()).unwrap();

        storage
            .add_session(Session::new("old".into(), "u1".into(), Duration::seconds(-1)))
            .await
            .unwrap();
        assert!(storage.find_session("old", Utc::now()).await.unwrap().is_none());

        storage
            .add_session(Session::new("new".into(), "u1".into(), Duration::hours(1)))
            .await
            .unwrap();
        assert!(storage.find_session("new", Utc::now()).await.unwrap().is_some());

        let reopened = UserStorage::open(dir.path()).unwrap();
        assert_eq!(reopened.sessions.read().await.len(), 1);
    }

    #[tokio::test]
    async fn removed_session_no_longer_resolves() {
        let dir = TempDir::new().unwrap();
        let storage = UserStorage::open(dir.path()).unwrap();

        storage
            .add_session(Session::new("tok".into(), "u1".into(), Duration::hours(1)))
            .await
            .unwrap();
        assert!(storage.remove_session("tok").await.unwrap());
        assert!(!storage.remove_session("tok").await.unwrap());
        assert!(storage.find_session("tok", Utc::now()).await.unwrap().is_none());
    }
}
