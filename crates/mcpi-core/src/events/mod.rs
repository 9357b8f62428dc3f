//! Canonical event union for everything the orchestration layer publishes.
//!
//! Display layers subscribe through the `InspectorEventEmitter` port; the
//! connection manager additionally observes `StatusChange`s synchronously
//! to keep its active set reconciled.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "status_changed", "change": { "serverId": "a", "from": "starting", "to": "running" } }
//! ```

mod connection;

use serde::{Deserialize, Serialize};

use crate::domain::{Category, LinkStatus, NotificationRecord, ServerId};
use crate::error::ErrorInfo;

pub use connection::StatusChange;

/// Canonical event types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InspectorEvent {
    /// A connection moved between lifecycle states.
    StatusChanged { change: StatusChange },

    /// The set of servers contributing to aggregated views changed.
    ActiveSetChanged { active: Vec<ServerId> },

    /// The outer control link changed status.
    LinkStatusChanged { status: LinkStatus },

    /// A category error was recorded (`Some`) or cleared (`None`).
    CategoryErrorChanged {
        #[serde(rename = "serverId")]
        server_id: ServerId,
        category: Category,
        error: Option<ErrorInfo>,
    },

    /// A server-initiated sampling request is waiting for a decision.
    SamplingQueued {
        id: u64,
        #[serde(rename = "serverId")]
        server_id: ServerId,
    },

    /// A pending sampling request was approved or rejected.
    SamplingResolved {
        id: u64,
        #[serde(rename = "serverId")]
        server_id: ServerId,
        approved: bool,
    },

    /// A notification or diagnostic line was appended to the log.
    NotificationReceived { record: NotificationRecord },
}

impl InspectorEvent {
    /// Get the event name for wire protocols.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "connection:status",
            Self::ActiveSetChanged { .. } => "connection:active",
            Self::LinkStatusChanged { .. } => "link:status",
            Self::CategoryErrorChanged { .. } => "request:category_error",
            Self::SamplingQueued { .. } => "sampling:queued",
            Self::SamplingResolved { .. } => "sampling:resolved",
            Self::NotificationReceived { .. } => "notification:received",
        }
    }

    pub const fn sampling_queued(id: u64, server_id: ServerId) -> Self {
        Self::SamplingQueued { id, server_id }
    }

    pub const fn sampling_resolved(id: u64, server_id: ServerId, approved: bool) -> Self {
        Self::SamplingResolved {
            id,
            server_id,
            approved,
        }
    }

    pub const fn notification_received(record: NotificationRecord) -> Self {
        Self::NotificationReceived { record }
    }
}
