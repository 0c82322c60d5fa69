use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use super::CredentialStore;
use crate::error::Result;
use crate::models::{session::Session, user::User};
use crate::repositories::{session as session_repo, user as user_repo};

/// PostgreSQL-backed credential store.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: Pool,
}

impl PgCredentialStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        user_repo::find_by_username(&self.pool, username).await
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        user_repo::create_user(&self.pool, Uuid::new_v4(), username, password_hash).await
    }

    async fn create_session(&self, user_id: Uuid, token: &str, lifetime_hours: i64) -> Result<Session> {
        session_repo::create_session(&self.pool, Uuid::new_v4(), user_id, token, lifetime_hours).await
    }

    async fn find_session_by_token(&self, token: &str) -> Result<Option<Session>> {
        session_repo::find_by_token(&self.pool, token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        session_repo::delete_by_token(&self.pool, token).await
    }

    async fn delete_expired_sessions(&self) -> Result<u64> {
        session_repo::delete_expired(&self.pool).await
    }
}
