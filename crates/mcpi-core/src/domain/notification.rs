//! Append-only notification and diagnostic records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::server::ServerId;

/// Where a notification record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSource {
    /// A protocol notification sent by the server
    Protocol,
    /// A line the server process wrote to stderr
    Stderr,
    /// A diagnostic produced by the transport itself
    Transport,
}

/// One entry in the session's notification log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub server_id: ServerId,
    pub source: NotificationSource,
    /// Protocol method for `Protocol` records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Raw text for `Stderr` and `Transport` records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn protocol(server_id: ServerId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            server_id,
            source: NotificationSource::Protocol,
            method: Some(method.into()),
            params,
            line: None,
            received_at: Utc::now(),
        }
    }

    pub fn stderr(server_id: ServerId, line: impl Into<String>) -> Self {
        Self::text(server_id, NotificationSource::Stderr, line)
    }

    pub fn transport(server_id: ServerId, line: impl Into<String>) -> Self {
        Self::text(server_id, NotificationSource::Transport, line)
    }

    fn text(server_id: ServerId, source: NotificationSource, line: impl Into<String>) -> Self {
        Self {
            server_id,
            source,
            method: None,
            params: None,
            line: Some(line.into()),
            received_at: Utc::now(),
        }
    }
}
