//! WebSocket client for the sidecar that owns the messaging-network session.
//!
//! Frames are JSON objects tagged by `type`. Events flow in unprompted;
//! requests carry a `request_id` that the sidecar echoes in its answer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::transport::{ChatTransport, TransportError};
use super::types::{Jid, Message, MessageEvent, TransportEvent};

const OUTBOUND_CAPACITY: usize = 64;

/// Frames sent by the sidecar.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundFrame {
    Qr {
        code: String,
    },
    PairSuccess,
    Connected,
    Disconnected,
    Message {
        event: MessageEvent,
    },
    SendResult {
        request_id: u64,
        #[serde(default)]
        error: Option<String>,
    },
    Roster {
        request_id: u64,
        #[serde(default)]
        participants: Vec<Jid>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Frames sent to the sidecar.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundFrame<'a> {
    Send {
        request_id: u64,
        chat: &'a Jid,
        message: &'a Message,
    },
    Roster {
        request_id: u64,
        chat: &'a Jid,
    },
}

/// Answer to a request: roster participants (empty for sends) or the
/// sidecar's error text.
type PendingReply = Result<Vec<Jid>, String>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<PendingReply>>>>;

struct Connection {
    outbound: mpsc::Sender<WsMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

pub struct BridgeTransport {
    url: String,
    request_timeout: Duration,
    connection: Mutex<Option<Connection>>,
    next_id: AtomicU64,
    pending: PendingMap,
}

impl BridgeTransport {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            request_timeout,
            connection: Mutex::new(None),
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn connection(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request(&self, request_id: u64, frame: String) -> Result<Vec<Jid>, TransportError> {
        let outbound = self
            .connection()
            .as_ref()
            .map(|conn| conn.outbound.clone())
            .ok_or(TransportError::NotConnected)?;

        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(request_id, tx);

        if outbound.send(WsMessage::Text(frame.into())).await.is_err() {
            lock_pending(&self.pending).remove(&request_id);
            return Err(TransportError::Closed);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(Ok(participants))) => Ok(participants),
            Ok(Ok(Err(remote))) => Err(TransportError::Remote(remote)),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                lock_pending(&self.pending).remove(&request_id);
                Err(TransportError::Timeout)
            }
        }
    }
}

#[async_trait]
impl ChatTransport for BridgeTransport {
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        let (stream, _) = connect_async(self.url.as_str()).await?;
        let (mut ws_sender, mut ws_receiver) = stream.split();
        tracing::info!("✅ Connected to chat bridge at {}", self.url);

        let (outbound, mut outbound_rx) = mpsc::channel::<WsMessage>(OUTBOUND_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = ws_sender.send(frame).await {
                    tracing::error!("❌ Failed to write to chat bridge: {}", e);
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let pending = self.pending.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_receiver.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => handle_frame(text.as_str(), &events, &pending).await,
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("❌ Chat bridge read error: {}", e);
                        break;
                    }
                }
            }

            fail_pending(&pending);
            tracing::info!("👋 Chat bridge connection ended");
            let _ = events.send(TransportEvent::Disconnected).await;
        });

        let previous = self.connection().replace(Connection {
            outbound,
            reader,
            writer,
        });
        if let Some(old) = previous {
            old.reader.abort();
            old.writer.abort();
        }

        Ok(())
    }

    async fn disconnect(&self) {
        let Some(conn) = self.connection().take() else {
            return;
        };

        let _ = conn.outbound.send(WsMessage::Close(None)).await;
        drop(conn.outbound);

        if tokio::time::timeout(self.request_timeout, conn.writer).await.is_err() {
            tracing::warn!("Chat bridge writer did not stop in time");
        }
        // The reader emits the final `Disconnected` once the socket is gone.
        if tokio::time::timeout(self.request_timeout, conn.reader).await.is_err() {
            tracing::warn!("Chat bridge reader did not stop in time");
        }
    }

    async fn send_message(&self, chat: &Jid, message: Message) -> Result<(), TransportError> {
        let request_id = self.next_request_id();
        let frame = sonic_rs::to_string(&OutboundFrame::Send {
            request_id,
            chat,
            message: &message,
        })?;

        self.request(request_id, frame).await.map(|_| ())
    }

    async fn group_roster(&self, chat: &Jid) -> Result<Vec<Jid>, TransportError> {
        let request_id = self.next_request_id();
        let frame = sonic_rs::to_string(&OutboundFrame::Roster { request_id, chat })?;

        self.request(request_id, frame).await
    }
}

async fn handle_frame(text: &str, events: &mpsc::Sender<TransportEvent>, pending: &PendingMap) {
    let frame: InboundFrame = match sonic_rs::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("Ignoring malformed bridge frame: {}", e);
            return;
        }
    };

    let event = match frame {
        InboundFrame::Qr { code } => TransportEvent::PairingCode(code),
        InboundFrame::PairSuccess => TransportEvent::PairSuccess,
        InboundFrame::Connected => TransportEvent::Connected,
        InboundFrame::Disconnected => TransportEvent::Disconnected,
        InboundFrame::Message { event } => TransportEvent::Message(Box::new(event)),
        InboundFrame::SendResult { request_id, error } => {
            resolve(pending, request_id, error.map_or(Ok(Vec::new()), Err));
            return;
        }
        InboundFrame::Roster {
            request_id,
            participants,
            error,
        } => {
            resolve(pending, request_id, error.map_or(Ok(participants), Err));
            return;
        }
    };

    if events.send(event).await.is_err() {
        tracing::debug!("Bridge event dropped: lifecycle task is gone");
    }
}

fn resolve(pending: &PendingMap, request_id: u64, reply: PendingReply) {
    match lock_pending(pending).remove(&request_id) {
        Some(tx) => {
            let _ = tx.send(reply);
        }
        None => tracing::debug!("Late or unknown bridge reply {}", request_id),
    }
}

/// Dropping the senders wakes every waiter with `Closed`.
fn fail_pending(pending: &PendingMap) {
    lock_pending(pending).clear();
}

fn lock_pending(pending: &PendingMap) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<PendingReply>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PendingMap {
        Arc::new(Mutex::new(HashMap::new()))
    }

    #[test]
    fn outbound_frames_are_tagged() {
        let chat = Jid::new("120363", "g.us");
        let message = Message::plain("🏓 Pong!");

        let send = sonic_rs::to_string(&OutboundFrame::Send {
            request_id: 7,
            chat: &chat,
            message: &message,
        })
        .unwrap();
        assert_eq!(
            send,
            r#"{"type":"send","request_id":7,"chat":"120363@g.us","message":{"conversation":"🏓 Pong!"}}"#
        );

        let roster = sonic_rs::to_string(&OutboundFrame::Roster { request_id: 8, chat: &chat }).unwrap();
        assert_eq!(roster, r#"{"type":"roster","request_id":8,"chat":"120363@g.us"}"#);
    }

    #[test]
    fn inbound_frames_decode() {
        let qr: InboundFrame = sonic_rs::from_str(r#"{"type":"qr","code":"2@abc"}"#).unwrap();
        assert_eq!(qr, InboundFrame::Qr { code: "2@abc".to_string() });

        let paired: InboundFrame = sonic_rs::from_str(r#"{"type":"pair_success"}"#).unwrap();
        assert_eq!(paired, InboundFrame::PairSuccess);

        let roster: InboundFrame = sonic_rs::from_str(
            r#"{"type":"roster","request_id":3,"participants":["1@s.whatsapp.net","2@s.whatsapp.net"]}"#,
        )
        .unwrap();
        assert_eq!(
            roster,
            InboundFrame::Roster {
                request_id: 3,
                participants: vec![Jid::new("1", "s.whatsapp.net"), Jid::new("2", "s.whatsapp.net")],
                error: None,
            }
        );

        let failed: InboundFrame =
            sonic_rs::from_str(r#"{"type":"send_result","request_id":4,"error":"not a participant"}"#).unwrap();
        assert_eq!(
            failed,
            InboundFrame::SendResult {
                request_id: 4,
                error: Some("not a participant".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn events_are_forwarded() {
        let (tx, mut rx) = mpsc::channel(8);
        let pending = pending();

        handle_frame(r#"{"type":"qr","code":"2@xyz"}"#, &tx, &pending).await;
        handle_frame(r#"{"type":"connected"}"#, &tx, &pending).await;
        handle_frame(
            r#"{"type":"message","event":{"info":{"id":"A","chat":"9@s.whatsapp.net","sender":"9@s.whatsapp.net"},"message":{"conversation":"!ping"}}}"#,
            &tx,
            &pending,
        )
        .await;

        assert_eq!(rx.recv().await, Some(TransportEvent::PairingCode("2@xyz".to_string())));
        assert_eq!(rx.recv().await, Some(TransportEvent::Connected));
        match rx.recv().await {
            Some(TransportEvent::Message(evt)) => assert_eq!(evt.command_text(), Some("!ping")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let (tx, mut rx) = mpsc::channel(8);
        handle_frame("not json", &tx, &pending()).await;
        handle_frame(r#"{"type":"mystery"}"#, &tx, &pending()).await;
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn replies_resolve_their_request() {
        let (tx, _rx) = mpsc::channel(8);
        let pending = pending();
        let (roster_tx, roster_rx) = oneshot::channel();
        let (send_tx, send_rx) = oneshot::channel();
        lock_pending(&pending).insert(1, roster_tx);
        lock_pending(&pending).insert(2, send_tx);

        handle_frame(r#"{"type":"roster","request_id":1,"participants":["5@s.whatsapp.net"]}"#, &tx, &pending).await;
        handle_frame(r#"{"type":"send_result","request_id":2,"error":"rate limited"}"#, &tx, &pending).await;

        assert_eq!(roster_rx.await.unwrap(), Ok(vec![Jid::new("5", "s.whatsapp.net")]));
        assert_eq!(send_rx.await.unwrap(), Err("rate limited".to_string()));
        assert!(lock_pending(&pending).is_empty());
    }

    #[tokio::test]
    async fn closing_fails_pending_requests() {
        let pending = pending();
        let (tx, rx) = oneshot::channel();
        lock_pending(&pending).insert(9, tx);

        fail_pending(&pending);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn requests_need_a_connection() {
        let transport = BridgeTransport::new("ws://127.0.0.1:9/bridge", Duration::from_millis(50));
        let err = transport
            .send_message(&Jid::new("1", "s.whatsapp.net"), Message::plain("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));

        // Disconnecting an idle transport is a no-op.
        transport.disconnect().await;
    }
}
