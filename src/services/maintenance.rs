use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::store::CredentialStore;

/// Periodically deletes expired sessions until `cancel` fires.
pub fn spawn_session_cleanup(
    store: Arc<dyn CredentialStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            tracing::info!("🧹 Running scheduled cleanup of expired sessions...");
            match store.delete_expired_sessions().await {
                Ok(count) => tracing::info!("✅ Cleanup job completed, {} session(s) removed", count),
                Err(e) => tracing::error!("❌ Cleanup job failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::Session;
    use crate::store::MemoryCredentialStore;
    use chrono::{Duration as ChronoDuration, Utc};
    use uuid::Uuid;

    fn session(token: &str, expires_in: Option<ChronoDuration>) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: token.to_string(),
            expires_at: expires_in.map(|d| Utc::now() + d),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn removes_expired_sessions_and_stops_on_cancel() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert_session(session("live", Some(ChronoDuration::hours(1))));
        store.insert_session(session("dead", Some(ChronoDuration::hours(-1))));
        store.insert_session(session("no-expiry", None));

        let cancel = CancellationToken::new();
        let task = spawn_session_cleanup(store.clone(), Duration::from_millis(10), cancel.clone());

        for _ in 0..100 {
            if store.session_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.session_count(), 1);
        assert!(store.find_session_by_token("live").await.unwrap().is_some());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
