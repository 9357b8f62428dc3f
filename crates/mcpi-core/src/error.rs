//! Error types for the orchestration layer.
//!
//! `InspectorError` is the taxonomy callers see. Transport adapters report
//! through `TransportError`; JSON-RPC error objects travel as `RpcError`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Category, LinkStatus, ServerId};

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// JSON-RPC "method not found".
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Code used when the operator declines a server-initiated request.
    pub const REJECTED_BY_OPERATOR: i64 = -1;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    /// Standard error returned to a server whose sampling request was rejected.
    pub fn rejected_by_operator(reason: Option<&str>) -> Self {
        let message = match reason {
            Some(reason) if !reason.is_empty() => format!("Request rejected by operator: {reason}"),
            _ => "Request rejected by operator".to_string(),
        };
        Self::new(Self::REJECTED_BY_OPERATOR, message)
    }
}

/// Failures reported by a transport adapter.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Failed to open transport: {0}")]
    Open(String),

    #[error("Initialize handshake failed: {0}")]
    Handshake(String),

    #[error("Server returned error: code={}, message={}", .0.code, .0.message)]
    Rpc(RpcError),

    #[error("Transport I/O error: {0}")]
    Io(String),

    #[error("Transport closed")]
    Closed,
}

/// Errors surfaced by the connection and request-orchestration layer.
#[derive(Debug, Error)]
pub enum InspectorError {
    /// Dispatch attempted on a connection that is not `Running`.
    #[error("Server not connected: {0}")]
    NotConnected(ServerId),

    /// Session open or initialize handshake failed.
    #[error("Handshake with {server_id} failed: {message}")]
    HandshakeFailed { server_id: ServerId, message: String },

    /// The validator rejected the response. The raw payload is kept for diagnostics.
    #[error("Invalid response shape for {method}: {message}")]
    InvalidResponseShape {
        method: String,
        message: String,
        raw: Value,
    },

    /// Send/receive failure surfaced by the session.
    #[error("Transport error during {method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: TransportError,
    },

    /// An in-flight request was invalidated by a disconnect.
    #[error("Connection to {0} closed while request was in flight")]
    ConnectionClosed(ServerId),

    /// The operator declined a server-initiated request.
    #[error("Sampling request rejected: {0}")]
    SamplingRejected(String),

    #[error("Unknown server: {0}")]
    UnknownServer(ServerId),

    #[error("Server already registered: {0}")]
    DuplicateServer(ServerId),

    /// The outer control link is not open, so no per-server operation may run.
    #[error("Control link is {0}, not open")]
    LinkUnavailable(LinkStatus),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// User-safe error information for events.
///
/// Carries no raw payloads, only what a display layer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,
    pub message: String,
    pub category: ErrorCategory,
}

/// Categories of errors for UI handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connect/disconnect lifecycle error.
    Lifecycle,
    /// Protocol communication error.
    Protocol,
    /// Response failed validation.
    Validation,
    /// Operator or link state prevented the operation.
    Unavailable,
    /// Configuration error.
    Configuration,
}

impl From<&InspectorError> for ErrorCategory {
    fn from(error: &InspectorError) -> Self {
        match error {
            InspectorError::HandshakeFailed { .. } | InspectorError::ConnectionClosed(_) => {
                Self::Lifecycle
            }
            InspectorError::Transport { .. } | InspectorError::SamplingRejected(_) => {
                Self::Protocol
            }
            InspectorError::InvalidResponseShape { .. } => Self::Validation,
            InspectorError::NotConnected(_)
            | InspectorError::UnknownServer(_)
            | InspectorError::LinkUnavailable(_) => Self::Unavailable,
            InspectorError::DuplicateServer(_) | InspectorError::InvalidConfig(_) => {
                Self::Configuration
            }
        }
    }
}

impl ErrorInfo {
    pub fn from_error(server_id: Option<ServerId>, error: &InspectorError) -> Self {
        Self {
            server_id,
            message: error.to_string(),
            category: ErrorCategory::from(error),
        }
    }

    /// Error info for a category-scoped dispatch failure.
    pub fn for_category(
        server_id: ServerId,
        category: Category,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            server_id: Some(server_id),
            message: format!("{category}: {message}"),
            category: ErrorCategory::Protocol,
        }
    }
}
