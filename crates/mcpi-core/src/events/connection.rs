//! Connection lifecycle events.

use serde::{Deserialize, Serialize};

use super::InspectorEvent;
use crate::domain::{Category, LinkStatus, ServerId, ServerStatus};
use crate::error::ErrorInfo;

/// One state-machine transition of one connection.
///
/// Published synchronously to status observers, in transition order per
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub server_id: ServerId,
    pub from: ServerStatus,
    pub to: ServerStatus,
    /// Failure message, only present when `to` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusChange {
    pub const fn new(server_id: ServerId, from: ServerStatus, to: ServerStatus) -> Self {
        Self {
            server_id,
            from,
            to,
            error: None,
        }
    }

    pub fn failed(server_id: ServerId, from: ServerStatus, error: impl Into<String>) -> Self {
        Self {
            server_id,
            from,
            to: ServerStatus::Failed,
            error: Some(error.into()),
        }
    }
}

impl InspectorEvent {
    pub const fn status_changed(change: StatusChange) -> Self {
        Self::StatusChanged { change }
    }

    pub const fn active_set_changed(active: Vec<ServerId>) -> Self {
        Self::ActiveSetChanged { active }
    }

    pub const fn link_status_changed(status: LinkStatus) -> Self {
        Self::LinkStatusChanged { status }
    }

    pub const fn category_error_changed(
        server_id: ServerId,
        category: Category,
        error: Option<ErrorInfo>,
    ) -> Self {
        Self::CategoryErrorChanged {
            server_id,
            category,
            error,
        }
    }
}
