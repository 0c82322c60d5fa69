use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::commands::handle_command;
use super::connector::BotConnector;
use super::qr;
use super::status::BotStatus;
use super::transport::{ChatTransport, TransportError};
use super::types::{MessageEvent, TransportEvent};
use crate::hub::NotificationHub;

const EVENT_CAPACITY: usize = 64;

/// The chat transport plus the state the web layer reads from it.
pub struct Bot {
    transport: Arc<dyn ChatTransport>,
    status: BotStatus,
    hub: NotificationHub,
    dispatch_capacity: usize,
}

impl Bot {
    pub fn new(transport: Arc<dyn ChatTransport>, hub: NotificationHub, dispatch_capacity: usize) -> Self {
        Self {
            transport,
            status: BotStatus::new(),
            hub,
            dispatch_capacity: dispatch_capacity.max(1),
        }
    }

    pub fn status(&self) -> &BotStatus {
        &self.status
    }

    /// Connects the transport and spawns the task that consumes its events.
    ///
    /// The task runs until `cancel` fires, then disconnects the transport and
    /// waits for queued commands to finish.
    pub async fn start(self: &Arc<Self>, cancel: CancellationToken) -> Result<JoinHandle<()>, TransportError> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        self.transport.connect(events_tx).await?;

        let bot = Arc::clone(self);
        Ok(tokio::spawn(async move { bot.run(events_rx, cancel).await }))
    }

    async fn run(self: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>, cancel: CancellationToken) {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(self.dispatch_capacity);
        let worker = tokio::spawn(dispatch_worker(self.transport.clone(), dispatch_rx));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, &dispatch_tx).await,
                    None => {
                        tracing::warn!("Chat transport event stream ended");
                        cancel.cancelled().await;
                        break;
                    }
                },
            }
        }

        tracing::info!("🛑 Stopping bot");
        BotConnector::disconnect(self.as_ref()).await;

        drop(dispatch_tx);
        if let Err(e) = worker.await {
            tracing::error!("❌ Dispatch worker failed: {}", e);
        }
    }

    async fn handle_event(&self, event: TransportEvent, dispatch: &mpsc::Sender<Box<MessageEvent>>) {
        match event {
            TransportEvent::PairingCode(code) => {
                self.status.record_qr_code(code.clone(), Utc::now());
                match qr::render_terminal(&code) {
                    Ok(rendered) => tracing::info!("📱 Scan this QR code to pair:\n{}", rendered),
                    Err(e) => tracing::warn!("Failed to render pairing QR code: {}", e),
                }
            }
            TransportEvent::PairSuccess => {
                tracing::info!("✅ Pairing completed");
                self.set_connected(true).await;
            }
            TransportEvent::Connected => self.set_connected(true).await,
            TransportEvent::Disconnected => self.set_connected(false).await,
            TransportEvent::Message(evt) => {
                if evt.command_text().is_none() {
                    return;
                }
                match dispatch.try_send(evt) {
                    Ok(()) => {}
                    Err(TrySendError::Full(evt)) => {
                        tracing::warn!("Dispatch queue full, dropping message {} from {}", evt.info.id, evt.info.chat);
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::error!("❌ Dispatch worker is gone, dropping message");
                    }
                }
            }
        }
    }

    async fn set_connected(&self, connected: bool) {
        if self.status.set_connected(connected) {
            if connected {
                tracing::info!("✅ Bot connected");
            } else {
                tracing::info!("👋 Bot disconnected");
            }
            self.hub.notify_connection_status(connected).await;
        }
    }
}

/// Runs commands one at a time, in arrival order.
async fn dispatch_worker(transport: Arc<dyn ChatTransport>, mut queue: mpsc::Receiver<Box<MessageEvent>>) {
    while let Some(evt) = queue.recv().await {
        if let Some(text) = evt.command_text() {
            handle_command(transport.as_ref(), text, &evt).await;
        }
    }
}

#[async_trait]
impl BotConnector for Bot {
    fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    async fn disconnect(&self) {
        self.transport.disconnect().await;
        self.set_connected(false).await;
    }

    fn latest_qr_code(&self) -> (String, DateTime<Utc>) {
        self.status.latest_qr_code()
    }
}
