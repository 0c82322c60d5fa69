//! In-memory chat transport and viewer sink for unit tests.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};

use super::transport::{ChatTransport, TransportError};
use super::types::{Jid, Message, TransportEvent};
use crate::hub::{ViewerError, ViewerSink};

#[derive(Default)]
pub(crate) struct RecordingTransport {
    inner: Mutex<Recorded>,
    send_gate: Mutex<Option<Arc<Semaphore>>>,
}

#[derive(Default)]
struct Recorded {
    roster: Vec<Jid>,
    sent: Vec<(Jid, Message)>,
    events: Option<mpsc::Sender<TransportEvent>>,
    roster_calls: usize,
    send_attempts: usize,
    connects: usize,
    disconnects: usize,
    fail_roster: bool,
    fail_sends: bool,
    fail_connect: bool,
}

impl RecordingTransport {
    pub(crate) fn with_roster(roster: Vec<Jid>) -> Self {
        let transport = Self::default();
        transport.lock().roster = roster;
        transport
    }

    pub(crate) fn sent(&self) -> Vec<(Jid, Message)> {
        self.lock().sent.clone()
    }

    pub(crate) fn roster_calls(&self) -> usize {
        self.lock().roster_calls
    }

    pub(crate) fn send_attempts(&self) -> usize {
        self.lock().send_attempts
    }

    pub(crate) fn connects(&self) -> usize {
        self.lock().connects
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.lock().disconnects
    }

    pub(crate) fn fail_roster(&self) {
        self.lock().fail_roster = true;
    }

    pub(crate) fn fail_sends(&self) {
        self.lock().fail_sends = true;
    }

    pub(crate) fn fail_connect(&self) {
        self.lock().fail_connect = true;
    }

    /// Blocks sends until permits are added to the returned semaphore.
    pub(crate) fn hold_sends(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.send_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Pushes an event as if the network had produced it.
    pub(crate) async fn emit(&self, event: TransportEvent) {
        let events = self.lock().events.clone().expect("transport not connected");
        events.send(event).await.expect("event receiver dropped");
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.fail_connect {
            return Err(TransportError::Closed);
        }
        inner.connects += 1;
        inner.events = Some(events);
        Ok(())
    }

    async fn disconnect(&self) {
        self.lock().disconnects += 1;
    }

    async fn send_message(&self, chat: &Jid, message: Message) -> Result<(), TransportError> {
        let fail = {
            let mut inner = self.lock();
            inner.send_attempts += 1;
            inner.fail_sends
        };
        if fail {
            return Err(TransportError::Remote("send refused".to_string()));
        }

        let gate = self.send_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.lock().sent.push((chat.clone(), message));
        Ok(())
    }

    async fn group_roster(&self, _chat: &Jid) -> Result<Vec<Jid>, TransportError> {
        let mut inner = self.lock();
        inner.roster_calls += 1;
        if inner.fail_roster {
            return Err(TransportError::Timeout);
        }
        Ok(inner.roster.clone())
    }
}

/// Viewer sink that records every frame it receives.
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    frames: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub(crate) fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }
}

#[async_trait]
impl ViewerSink for RecordingSink {
    async fn send_text(&mut self, text: String) -> Result<(), ViewerError> {
        self.frames.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) {}
}

/// Polls `check` until it holds or a second has passed.
pub(crate) async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
