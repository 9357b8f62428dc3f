//! Transport session contract.
//!
//! The core never touches byte streams. A `TransportConnector` opens one
//! session per connect attempt (spawning a subprocess or dialing an HTTP
//! stream, then running the initialize handshake) and hands back the
//! session, the handshake result and a channel of server-initiated traffic.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::domain::{ClientInfo, InitializeResult, TransportConfig};
use crate::error::{RpcError, TransportError};

/// A client-to-server request. Correlation ids belong to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: String,
    pub params: Option<Value>,
}

/// One open physical connection to one server.
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Send a request and wait for its correlated response.
    async fn send(&self, request: OutboundRequest) -> Result<Value, TransportError>;

    /// Send a notification (no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError>;

    /// Close the session. Must be idempotent.
    async fn close(&self);
}

/// Everything a successful open produces.
pub struct OpenedSession {
    pub session: Arc<dyn TransportSession>,
    pub initialize: InitializeResult,
    pub inbound: mpsc::UnboundedReceiver<InboundMessage>,
}

/// Opens transport sessions. Supplied by the embedding application.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a session and complete the initialize handshake.
    async fn open(
        &self,
        config: &TransportConfig,
        client: &ClientInfo,
    ) -> Result<OpenedSession, TransportError>;
}

/// Server-to-client traffic delivered on a session's inbound channel.
#[derive(Debug)]
pub enum InboundMessage {
    /// A request the server expects an answer to (sampling, roots, ping).
    Request(ServerRequest),
    /// A protocol notification.
    Notification { method: String, params: Option<Value> },
    /// A diagnostic line (subprocess stderr).
    Stderr(String),
    /// The session ended on the transport's side.
    Closed { reason: Option<String> },
}

/// A server-initiated request and the single-use handle that answers it.
#[derive(Debug)]
pub struct ServerRequest {
    pub method: String,
    pub params: Option<Value>,
    pub responder: ResponseSender,
}

/// Single-use answer handle for a server-initiated request.
///
/// Consumed by value, so a request is answered at most once.
#[derive(Debug)]
pub struct ResponseSender(oneshot::Sender<Result<Value, RpcError>>);

impl ResponseSender {
    /// Create a responder and the receiver the transport awaits.
    pub fn channel() -> (Self, oneshot::Receiver<Result<Value, RpcError>>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Answer with a result. Returns `false` if the transport stopped waiting.
    pub fn resolve(self, result: Value) -> bool {
        self.0.send(Ok(result)).is_ok()
    }

    /// Answer with an error. Returns `false` if the transport stopped waiting.
    pub fn reject(self, error: RpcError) -> bool {
        self.0.send(Err(error)).is_ok()
    }
}
