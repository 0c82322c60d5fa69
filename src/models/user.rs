use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a dashboard user.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's username.
    pub username: String,
    /// The user's Argon2 password hash in PHC format.
    pub password_hash: String,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
}
