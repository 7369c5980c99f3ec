//! Accounts, password checks and cookie sessions.
//!
//! A session token has the form `<session-id>.<secret>`. Only the SHA-256 of
//! the secret is persisted, so a leaked sessions table cannot be replayed.

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::forms::SignupCommand;
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::users::{validate_password, validate_username};

const TOKEN_SEPARATOR: char = '.';
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("username `{0}` is already taken")]
    DuplicateUsername(String),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A freshly opened session; `token` goes into the cookie.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub async fn register(&self, command: SignupCommand) -> Result<UserRecord, AuthError> {
        let username = validate_username(&command.username)?;
        validate_password(&command.password)?;

        let password_hash = hash_password(command.password).await?;
        let user = self
            .users
            .create_user(CreateUserParams {
                username: username.clone(),
                password_hash,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => AuthError::DuplicateUsername(username),
                other => AuthError::Repo(other),
            })?;

        info!(target = "murmur::auth", user = %user.username, "account created");
        Ok(user)
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        let user = self
            .users
            .find_user_by_username(username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if verify_password(password.to_string(), user.password_hash.clone()).await? {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    pub async fn start_session(&self, user: &UserRecord) -> Result<IssuedSession, AuthError> {
        let secret = generate_secret();
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;
        let session = self
            .sessions
            .create_session(CreateSessionParams {
                user_id: user.id,
                token_hash: hash_secret(&secret),
                expires_at,
            })
            .await?;

        debug!(target = "murmur::auth", user = %user.username, session_id = %session.id, "session opened");
        Ok(IssuedSession {
            token: format!("{}{TOKEN_SEPARATOR}{secret}", session.id.simple()),
            expires_at,
        })
    }

    /// Resolve a cookie token to its user. Malformed, unknown and expired
    /// tokens all resolve to `None`.
    pub async fn resolve(&self, token: &str) -> Result<Option<UserRecord>, AuthError> {
        let Some((session_id, secret)) = parse_token(token) else {
            return Ok(None);
        };
        let Some(session) = self.sessions.find_session(session_id).await? else {
            return Ok(None);
        };

        let hashed = hash_secret(secret);
        if session.token_hash.as_bytes().ct_eq(hashed.as_bytes()).unwrap_u8() == 0 {
            return Ok(None);
        }
        if session.is_expired(OffsetDateTime::now_utc()) {
            self.sessions.delete_session(session.id).await?;
            return Ok(None);
        }

        Ok(self.users.find_user_by_id(session.user_id).await?)
    }

    pub async fn end_session(&self, token: &str) -> Result<(), AuthError> {
        if let Some((session_id, _)) = parse_token(token) {
            self.sessions.delete_session(session_id).await?;
        }
        Ok(())
    }
}

pub async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(rand::thread_rng());
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AuthError::Hashing(err.to_string()))
    })
    .await
    .map_err(|err| AuthError::Hashing(err.to_string()))?
}

async fn verify_password(password: String, stored: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&stored).map_err(|err| AuthError::Hashing(err.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|err| AuthError::Hashing(err.to_string()))?
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn parse_token(token: &str) -> Option<(Uuid, &str)> {
    let (id, secret) = token.split_once(TOKEN_SEPARATOR)?;
    if secret.len() < MIN_SECRET_LEN {
        return None;
    }
    let id = Uuid::try_parse(id).ok()?;
    Some((id, secret))
}
