//! Accounts, sessions and the request identity.
//!
//! Passwords are hashed with bcrypt. Login hands out an opaque bearer token;
//! only its SHA-256 digest is persisted, so a leaked sessions file cannot be
//! replayed.

use anyhow::Context;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use crate::access::AccessError;
use crate::error::AppError;
use crate::models::{LoginResponse, SignupResponse};
use crate::state::AppState;
use crate::user_models::{Session, User};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_USERNAME_LEN: usize = 32;

/// Hash checked against when the username is unknown, so a failed login
/// costs one bcrypt verification whether or not the account exists.
static PLACEHOLDER_HASH: OnceLock<String> = OnceLock::new();

fn placeholder_hash(cost: u32) -> Result<&'static str, AppError> {
    if let Some(hash) = PLACEHOLDER_HASH.get() {
        return Ok(hash.as_str());
    }
    let hash = bcrypt::hash(Uuid::new_v4().simple().to_string(), cost)
        .context("Failed to hash placeholder password")?;
    Ok(PLACEHOLDER_HASH.get_or_init(|| hash).as_str())
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub async fn signup(state: &AppState, username: &str, password: &str) -> Result<SignupResponse, AppError> {
    let username = username.trim();

    if username.is_empty() {
        return Err(AppError::BadRequest("Username cannot be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let password_hash =
        bcrypt::hash(password, state.config.bcrypt_cost).context("Failed to hash password")?;

    let user = state
        .users
        .create_user(User::new(username.to_string(), password_hash))
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "account created");
    Ok(SignupResponse {
        id: user.id,
        username: user.username,
    })
}

pub async fn login(state: &AppState, username: &str, password: &str) -> Result<LoginResponse, AppError> {
    let Some(user) = state.users.get_user_by_username(username.trim()).await? else {
        let _ = bcrypt::verify(password, placeholder_hash(state.config.bcrypt_cost)?);
        tracing::warn!("rejected login for unknown username");
        return Err(AppError::InvalidCredentials);
    };

    let valid = bcrypt::verify(password, &user.password_hash).context("Failed to verify password")?;
    if !valid {
        tracing::warn!(username = %user.username, "rejected login");
        return Err(AppError::InvalidCredentials);
    }

    let token = Uuid::new_v4().simple().to_string();
    let session = state
        .users
        .add_session(Session::new(hash_token(&token), user.id.clone(), state.config.session_ttl()))
        .await?;

    tracing::info!(user_id = %user.id, "login");
    Ok(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        expires_at: session.expires_at,
    })
}

pub async fn logout(state: &AppState, token: &str) -> Result<(), AppError> {
    state.users.remove_session(&hash_token(token)).await?;
    Ok(())
}

/// Resolve a bearer token into the caller it belongs to.
pub async fn authenticate(state: &AppState, token: &str) -> Result<Option<Identity>, AppError> {
    let Some(session) = state.users.find_session(&hash_token(token), Utc::now()).await? else {
        return Ok(None);
    };
    let Some(user) = state.users.get_user_by_id(&session.user_id).await? else {
        return Ok(None);
    };

    Ok(Some(Identity {
        user_id: user.id,
        username: user.username,
    }))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The raw bearer token of a request, for logout.
pub struct BearerToken(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        bearer_token(parts)
            .map(|t| BearerToken(t.to_string()))
            .ok_or(AppError::Access(AccessError::Unauthenticated))
    }
}

/// The caller's identity when the request carries a live session.
///
/// A missing, malformed or expired token yields `None`; the access layer
/// decides what an anonymous caller may do.
pub struct MaybeIdentity(pub Option<Identity>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(MaybeIdentity(None));
        };
        Ok(MaybeIdentity(authenticate(state, token).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use assert_matches::assert_matches;
    use clap::Parser;
    use tempfile::TempDir;

    fn test_state(dir: &TempDir) -> AppState {
        let mut config = Config::parse_from(["server", "--bcrypt-cost", "4"]);
        config.data_dir = dir.path().to_path_buf();
        AppState::open(config).unwrap()
    }

    #[test]
    fn token_hash_is_stable_hex() {
        let hash = hash_token("abc");
        assert_eq!(hash, hash_token("abc"));
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, hash_token("abd"));
    }

    #[tokio::test]
    async fn signup_rules() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        assert_matches!(signup(&state, "  ", "secret1").await, Err(AppError::BadRequest(_)));
        assert_matches!(signup(&state, "ada", "short").await, Err(AppError::BadRequest(_)));

        let created = signup(&state, " ada ", "secret1").await.unwrap();
        assert_eq!(created.username, "ada");
        assert_matches!(signup(&state, "ada", "secret2").await, Err(AppError::UsernameTaken));
    }

    #[tokio::test]
    async fn login_issues_token_that_authenticates_until_logout() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let created = signup(&state, "ada", "secret1").await.unwrap();

        assert_matches!(login(&state, "ada", "wrong-password").await, Err(AppError::InvalidCredentials));
        assert_matches!(login(&state, "nobody", "secret1").await, Err(AppError::InvalidCredentials));

        let session = login(&state, "ada", "secret1").await.unwrap();
        let identity = authenticate(&state, &session.token).await.unwrap().unwrap();
        assert_eq!(identity.user_id, created.id);
        assert_eq!(identity.username, "ada");

        let on_disk = std::fs::read_to_string(dir.path().join("sessions.json")).unwrap();
        assert!(!on_disk.contains(&session.token));
        assert!(on_disk.contains(&hash_token(&session.token)));

        logout(&state, &session.token).await.unwrap();
        assert!(authenticate(&state, &session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_username_still_runs_bcrypt() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        assert_matches!(login(&state, "ghost", "secret1").await, Err(AppError::InvalidCredentials));

        let hash = PLACEHOLDER_HASH.get().expect("placeholder hash is computed on the miss path");
        assert!(hash.starts_with("$2"));
        assert!(!bcrypt::verify("secret1", hash).unwrap());
        assert_eq!(placeholder_hash(4).unwrap(), hash.as_str());
    }

    #[tokio::test]
    async fn expired_session_does_not_authenticate() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::parse_from(["server", "--bcrypt-cost", "4", "--session-ttl-hours", "0"]);
        config.data_dir = dir.path().to_path_buf();
        let state = AppState::open(config).unwrap();

        signup(&state, "ada", "secret1").await.unwrap();
        let session = login(&state, "ada", "secret1").await.unwrap();
        assert!(authenticate(&state, &session.token).await.unwrap().is_none());
    }
}
