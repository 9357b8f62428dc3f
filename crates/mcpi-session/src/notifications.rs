//! Append-only log of server notifications and diagnostic output.

use mcpi_core::{InspectorEvent, InspectorEventEmitter, NotificationRecord, ServerId};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the live-tail broadcast channel
const TAIL_CAPACITY: usize = 1000;

/// Notifications from all servers in arrival order.
pub struct NotificationLog {
    records: RwLock<Vec<NotificationRecord>>,
    tail_tx: broadcast::Sender<NotificationRecord>,
    emitter: Arc<dyn InspectorEventEmitter>,
}

impl NotificationLog {
    pub fn new(emitter: Arc<dyn InspectorEventEmitter>) -> Self {
        let (tail_tx, _) = broadcast::channel(TAIL_CAPACITY);
        Self {
            records: RwLock::new(Vec::new()),
            tail_tx,
            emitter,
        }
    }

    /// Append a record and fan it out to live subscribers.
    pub fn append(&self, record: NotificationRecord) {
        trace!(server_id = %record.server_id, method = ?record.method, "Notification logged");
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());

        // No receivers is fine
        let _ = self.tail_tx.send(record.clone());
        self.emitter
            .emit(InspectorEvent::notification_received(record));
    }

    pub fn records(&self) -> Vec<NotificationRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn records_for(&self, server_id: &ServerId) -> Vec<NotificationRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|record| &record.server_id == server_id)
            .cloned()
            .collect()
    }

    /// Receive records appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationRecord> {
        self.tail_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
