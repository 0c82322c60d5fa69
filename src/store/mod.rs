//! The credential store seam: users and dashboard sessions.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{session::Session, user::User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Persistence for dashboard users and their session tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User>;

    /// Persists a session that expires `lifetime_hours` from now.
    async fn create_session(&self, user_id: Uuid, token: &str, lifetime_hours: i64) -> Result<Session>;

    /// Returns the session for `token` whether or not it has expired.
    async fn find_session_by_token(&self, token: &str) -> Result<Option<Session>>;

    /// Deletes the session for `token`; a missing token is not an error.
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;

    /// Removes expired sessions and returns how many were deleted.
    async fn delete_expired_sessions(&self) -> Result<u64>;
}
