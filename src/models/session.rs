use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a dashboard login session.
#[derive(Debug, Clone)]
pub struct Session {
    /// The row identifier.
    pub id: Uuid,
    /// The ID of the user this session belongs to.
    pub user_id: Uuid,
    /// The opaque hex token carried by the session cookie.
    pub token: String,
    /// The timestamp when the session expires. Rows without one are invalid.
    pub expires_at: Option<DateTime<Utc>>,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session may still be used at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at > now)
    }
}
