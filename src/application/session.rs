//! Session issuance and lookup.
//!
//! Tokens have the form `ps_<session id>_<secret>`. Only a SHA-256 digest of
//! the secret is stored; lookups compare digests in constant time.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::accounts::verify_password;
use crate::application::repos::{CreateSessionParams, RepoError, SessionsRepo, UsersRepo};
use crate::domain::entities::{SessionRecord, UserRecord};
use crate::domain::users::normalize_email;

const TOKEN_PREFIX: &str = "ps";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("email or password is incorrect")]
    InvalidCredentials,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing session")]
    Missing,
    #[error("invalid session")]
    Invalid,
    #[error("expired session")]
    Expired,
}

/// The authenticated user behind the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub viewer: Viewer,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(users: Arc<dyn UsersRepo>, sessions: Arc<dyn SessionsRepo>, ttl: Duration) -> Self {
        Self {
            users,
            sessions,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Verify credentials and open a new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, SessionError> {
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(SessionError::InvalidCredentials)?;

        if !verify_password(password.to_string(), user.password_hash.clone()).await {
            debug!(
                target = "postboard::session",
                user_id = %user.id,
                "password mismatch"
            );
            return Err(SessionError::InvalidCredentials);
        }

        self.issue(&user).await
    }

    /// Open a session for an already verified user.
    pub async fn issue(&self, user: &UserRecord) -> Result<IssuedSession, SessionError> {
        let id = Uuid::new_v4();
        let secret = Self::generate_secret();
        let expires_at = OffsetDateTime::now_utc() + self.ttl;

        let record = self
            .sessions
            .create_session(CreateSessionParams {
                id,
                user_id: user.id,
                hashed_secret: Self::hash_secret(&secret),
                expires_at,
            })
            .await?;

        info!(
            target = "postboard::session",
            user_id = %user.id,
            session_id = %record.id,
            "session opened"
        );

        Ok(IssuedSession {
            viewer: viewer_for(user, &record),
            token: format!("{TOKEN_PREFIX}_{}_{secret}", id.simple()),
            expires_at: record.expires_at,
        })
    }

    /// Resolve a token to its viewer.
    pub async fn authenticate(&self, token: &str) -> Result<Viewer, AuthError> {
        let parsed = Self::parse_token(token).ok_or(AuthError::Invalid)?;
        let record = self.verified_session(&parsed).await?;

        if record.expires_at <= OffsetDateTime::now_utc() {
            // best-effort cleanup; the caller is already rejected
            let sessions = self.sessions.clone();
            tokio::spawn(async move {
                let _ = sessions.delete_session(record.id).await;
            });
            return Err(AuthError::Expired);
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await
            .map_err(|_| AuthError::Invalid)?
            .ok_or(AuthError::Invalid)?;

        Ok(viewer_for(&user, &record))
    }

    /// Close the session behind `token`. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), SessionError> {
        let Some(parsed) = Self::parse_token(token) else {
            return Ok(());
        };
        match self.verified_session(&parsed).await {
            Ok(record) => {
                self.sessions.delete_session(record.id).await?;
                info!(
                    target = "postboard::session",
                    session_id = %record.id,
                    "session closed"
                );
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }

    /// Delete sessions that expired before now.
    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        let removed = self
            .sessions
            .delete_expired(OffsetDateTime::now_utc())
            .await?;
        if removed > 0 {
            info!(
                target = "postboard::session",
                removed, "purged expired sessions"
            );
        }
        Ok(removed)
    }

    async fn verified_session(&self, parsed: &ParsedToken) -> Result<SessionRecord, AuthError> {
        let record = self
            .sessions
            .find_session(parsed.id)
            .await
            .map_err(|_| AuthError::Invalid)?
            .ok_or(AuthError::Invalid)?;

        let hashed_input = Self::hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AuthError::Invalid);
        }
        Ok(record)
    }

    fn hash_secret(secret: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.finalize().to_vec()
    }

    fn generate_secret() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    fn parse_token(token: &str) -> Option<ParsedToken> {
        let mut parts = token.trim().splitn(3, '_');
        if parts.next()? != TOKEN_PREFIX {
            return None;
        }
        let id = Uuid::try_parse(parts.next()?).ok()?;
        let secret = parts.next()?;
        if secret.len() < MIN_SECRET_LEN {
            return None;
        }
        Some(ParsedToken {
            id,
            secret: secret.to_string(),
        })
    }
}

fn viewer_for(user: &UserRecord, session: &SessionRecord) -> Viewer {
    Viewer {
        user_id: user.id,
        session_id: session.id,
        name: user.name.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        created_at: user.created_at,
    }
}

struct ParsedToken {
    id: Uuid,
    secret: String,
}
