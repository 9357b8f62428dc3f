//! Bounded log of dispatched requests and their outcomes.

use chrono::{DateTime, Utc};
use mcpi_core::{InspectorError, RequestEnvelope, ServerId};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// One dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub server_id: ServerId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    pub(crate) fn success(
        server_id: ServerId,
        envelope: &RequestEnvelope,
        response: Value,
    ) -> Self {
        Self {
            server_id,
            method: envelope.method.clone(),
            params: envelope.params.clone(),
            response: Some(response),
            error: None,
            at: Utc::now(),
        }
    }

    pub(crate) fn failure(
        server_id: ServerId,
        envelope: &RequestEnvelope,
        error: &InspectorError,
    ) -> Self {
        Self {
            server_id,
            method: envelope.method.clone(),
            params: envelope.params.clone(),
            response: None,
            error: Some(error.to_string()),
            at: Utc::now(),
        }
    }

    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Request history shared by all connections, oldest first.
///
/// A `limit` of 0 keeps everything.
#[derive(Debug)]
pub struct RequestHistory {
    limit: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl RequestHistory {
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(entry);
        if self.limit > 0 {
            while entries.len() > self.limit {
                entries.pop_front();
            }
        }
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn entries_for(&self, server_id: &ServerId) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| &entry.server_id == server_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
