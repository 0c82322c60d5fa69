//! Live dashboard viewers and the status pushes they receive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::bot::connector::BotConnector;

pub mod sink;

/// Connection state as shown to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl From<bool> for ConnectionState {
    fn from(connected: bool) -> Self {
        if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

/// Messages pushed to viewers: `{"type": "status", "payload": "connected"}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum HubEvent {
    Status(ConnectionState),
}

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("viewer write timed out")]
    Timeout,

    #[error("viewer connection closed: {0}")]
    Closed(String),
}

/// The writing half of a viewer connection.
#[async_trait]
pub trait ViewerSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), ViewerError>;

    async fn close(&mut self);
}

pub type ViewerId = Uuid;

type SharedSink = Arc<AsyncMutex<Box<dyn ViewerSink>>>;

/// Registry of connected viewers.
///
/// The membership map sits behind one lock that is never held across a
/// network write. Each viewer's sink has its own lock, which keeps writes
/// to a single viewer ordered.
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    viewers: Mutex<HashMap<ViewerId, SharedSink>>,
    write_timeout: Duration,
}

impl NotificationHub {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                viewers: Mutex::new(HashMap::new()),
                write_timeout,
            }),
        }
    }

    /// Adds a viewer and sends it the current status before anything else.
    ///
    /// The status is read while the membership lock is held, so any change
    /// after that point reaches the new viewer through a broadcast.
    pub async fn register(&self, sink: Box<dyn ViewerSink>, connector: &dyn BotConnector) -> ViewerId {
        let id = Uuid::new_v4();
        let sink: SharedSink = Arc::new(AsyncMutex::new(sink));

        // Hold the viewer's own lock until the snapshot is out so a concurrent
        // broadcast cannot overtake it.
        let mut guard = sink.clone().lock_owned().await;

        let connected = {
            let mut viewers = self.viewers();
            viewers.insert(id, sink);
            connector.is_connected()
        };

        tracing::info!("👀 Viewer {} connected ({} total)", id, self.viewer_count());

        let written = match encode(&HubEvent::Status(connected.into())) {
            Some(text) => self.write(&mut **guard, text).await,
            None => Ok(()),
        };
        drop(guard);

        if let Err(e) = written {
            tracing::warn!("❌ Failed to send initial status to viewer {}: {}", id, e);
            self.unregister(id).await;
        }

        id
    }

    /// Removes a viewer and closes its connection. Unknown ids are ignored.
    pub async fn unregister(&self, id: ViewerId) {
        let removed = self.viewers().remove(&id);

        if let Some(sink) = removed {
            let mut sink = sink.lock().await;
            let _ = tokio::time::timeout(self.inner.write_timeout, sink.close()).await;
            tracing::info!("👋 Viewer {} disconnected", id);
        }
    }

    /// Pushes a connection-state change to every registered viewer.
    pub async fn notify_connection_status(&self, connected: bool) {
        self.broadcast(&HubEvent::Status(connected.into())).await;
    }

    /// Writes `event` to every viewer registered right now.
    ///
    /// Viewers whose write fails or times out are closed and dropped in the
    /// same pass; the others are unaffected.
    pub async fn broadcast(&self, event: &HubEvent) {
        let Some(text) = encode(event) else {
            return;
        };

        let targets: Vec<(ViewerId, SharedSink)> = self
            .viewers()
            .iter()
            .map(|(id, sink)| (*id, sink.clone()))
            .collect();

        let writes = targets.into_iter().map(|(id, sink)| {
            let text = text.clone();
            async move {
                let mut sink = sink.lock().await;
                (id, self.write(&mut **sink, text).await)
            }
        });

        for (id, result) in join_all(writes).await {
            if let Err(e) = result {
                tracing::warn!("❌ Failed to write to viewer {}: {}", id, e);
                self.unregister(id).await;
            }
        }
    }

    /// Closes every viewer; used on shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<(ViewerId, SharedSink)> = self.viewers().drain().collect();
        let count = drained.len();

        join_all(drained.into_iter().map(|(_, sink)| async move {
            let mut sink = sink.lock().await;
            let _ = tokio::time::timeout(self.inner.write_timeout, sink.close()).await;
        }))
        .await;

        tracing::info!("✅ Closed {} viewer connection(s)", count);
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers().len()
    }

    async fn write(&self, sink: &mut dyn ViewerSink, text: String) -> Result<(), ViewerError> {
        match tokio::time::timeout(self.inner.write_timeout, sink.send_text(text)).await {
            Ok(result) => result,
            Err(_) => Err(ViewerError::Timeout),
        }
    }

    fn viewers(&self) -> MutexGuard<'_, HashMap<ViewerId, SharedSink>> {
        self.inner.viewers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn encode(event: &HubEvent) -> Option<String> {
    match sonic_rs::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!("Failed to serialize hub event: {}", e);
            None
        }
    }
}
