use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// What the web layer may do with the bot: read its state and disconnect it.
#[async_trait]
pub trait BotConnector: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn disconnect(&self);

    /// The most recent pairing code and when it was emitted (epoch if never).
    fn latest_qr_code(&self) -> (String, DateTime<Utc>);
}
