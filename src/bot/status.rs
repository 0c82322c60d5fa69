use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

/// Connection flag and the latest pairing code, behind one lock.
///
/// Written only by the bot lifecycle; read by the dashboard and the hub.
#[derive(Debug, Default)]
pub struct BotStatus {
    inner: Mutex<StatusInner>,
}

#[derive(Debug, Default)]
struct StatusInner {
    connected: bool,
    qr_code: String,
    /// Epoch until the first code arrives.
    qr_timestamp: DateTime<Utc>,
}

impl BotStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Stores the flag and reports whether it changed.
    pub fn set_connected(&self, connected: bool) -> bool {
        let mut inner = self.lock();
        let changed = inner.connected != connected;
        inner.connected = connected;
        changed
    }

    /// Replaces the cached pairing code. The old one is never cleared after pairing.
    pub fn record_qr_code(&self, code: String, at: DateTime<Utc>) {
        let mut inner = self.lock();
        inner.qr_code = code;
        inner.qr_timestamp = at;
    }

    pub fn latest_qr_code(&self) -> (String, DateTime<Utc>) {
        let inner = self.lock();
        (inner.qr_code.clone(), inner.qr_timestamp)
    }

    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
