//! Routing of server-initiated traffic for one live session.

use mcpi_core::{InboundMessage, NotificationRecord, RpcError, ServerRequest};
use serde_json::{Value, json};
use std::sync::Weak;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::Connection;

const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
const ROOTS_LIST: &str = "roots/list";
const PING: &str = "ping";

const CLOSED_REASON: &str = "Transport closed";

/// Drain `inbound` until the session is cancelled locally or ends remotely.
///
/// A remote end fails the connection if `generation` is still the live
/// session.
pub(crate) fn spawn_pump(
    connection: Weak<Connection>,
    generation: u64,
    cancel: CancellationToken,
    mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
) {
    tokio::spawn(async move {
        let reason = loop {
            let message = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                message = inbound.recv() => message,
            };

            let Some(message) = message else {
                break CLOSED_REASON.to_string();
            };
            let Some(conn) = connection.upgrade() else {
                return;
            };

            match message {
                InboundMessage::Request(request) => route_request(&conn, request),
                InboundMessage::Notification { method, params } => {
                    debug!(server_id = %conn.id(), method = %method, "Server notification");
                    conn.ctx.notifications.append(NotificationRecord::protocol(
                        conn.id().clone(),
                        method,
                        params,
                    ));
                }
                InboundMessage::Stderr(line) => {
                    conn.ctx
                        .notifications
                        .append(NotificationRecord::stderr(conn.id().clone(), line));
                }
                InboundMessage::Closed { reason } => {
                    break reason.unwrap_or_else(|| CLOSED_REASON.to_string());
                }
            }
        };

        if let Some(conn) = connection.upgrade() {
            conn.ctx.notifications.append(NotificationRecord::transport(
                conn.id().clone(),
                reason.clone(),
            ));
            conn.fail_session(generation, reason).await;
        }
    });
}

fn route_request(conn: &Connection, request: ServerRequest) {
    let ServerRequest {
        method,
        params,
        responder,
    } = request;

    match method.as_str() {
        SAMPLING_CREATE_MESSAGE => {
            conn.ctx.sampling.enqueue(
                conn.id().clone(),
                params.unwrap_or(Value::Null),
                responder,
            );
        }
        ROOTS_LIST => {
            let roots = json!({ "roots": conn.ctx.roots });
            if !responder.resolve(roots) {
                debug!(server_id = %conn.id(), "roots/list answer dropped, server stopped waiting");
            }
        }
        PING => {
            responder.resolve(json!({}));
        }
        other => {
            warn!(server_id = %conn.id(), method = %other, "Unsupported server request");
            responder.reject(RpcError::method_not_found(other));
        }
    }
}
