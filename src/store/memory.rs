use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::CredentialStore;
use crate::error::{AppError, Result};
use crate::models::{session::Session, user::User};

/// An in-process credential store for tests and single-node experiments.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    sessions: Vec<Session>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session row verbatim, bypassing lifetime computation.
    pub fn insert_session(&self, session: Session) {
        self.tables().sessions.push(session);
    }

    /// Number of session rows currently stored.
    pub fn session_count(&self) -> usize {
        self.tables().sessions.len()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn token_matches(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.tables().users.get(username).cloned())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let mut tables = self.tables();
        if tables.users.contains_key(username) {
            return Err(AppError::Validation(format!("username {} already exists", username)));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        tables.users.insert(username.to_string(), user.clone());
        Ok(user)
    }

    async fn create_session(&self, user_id: Uuid, token: &str, lifetime_hours: i64) -> Result<Session> {
        let mut tables = self.tables();
        if tables.sessions.iter().any(|s| token_matches(&s.token, token)) {
            return Err(AppError::Validation("session token already exists".to_string()));
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            expires_at: Some(now + Duration::hours(lifetime_hours)),
            created_at: now,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session_by_token(&self, token: &str) -> Result<Option<Session>> {
        Ok(self
            .tables()
            .sessions
            .iter()
            .find(|s| token_matches(&s.token, token))
            .cloned())
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        self.tables().sessions.retain(|s| !token_matches(&s.token, token));
        Ok(())
    }

    async fn delete_expired_sessions(&self) -> Result<u64> {
        let now = Utc::now();
        let mut tables = self.tables();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.is_valid_at(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}
