//! Display view of a server-initiated sampling request awaiting a decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::server::ServerId;

/// Read-only view of a pending sampling request.
///
/// The resolution capability stays inside the queue; collaborators only
/// ever see this view and decide through `approve`/`reject`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSamplingView {
    pub id: u64,
    pub origin_server_id: ServerId,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}
