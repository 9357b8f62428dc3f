//! In-memory transport for tests and demos.
//!
//! A [`LoopbackServer`] is a scripted server: it answers requests from
//! per-method reply queues, can hold its handshake or replies open until
//! released, and can push server-initiated traffic into the live session.
//! [`LoopbackConnector`] routes connect attempts to registered servers by
//! stdio command or stream URL.

use async_trait::async_trait;
use mcpi_core::{
    ClientInfo, Implementation, InboundMessage, InitializeResult, OpenedSession, OutboundRequest,
    ResponseSender, RpcError, ServerCapabilities, ServerRequest, TransportConfig,
    TransportConnector, TransportError, TransportSession,
};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};

type Reply = Result<Value, TransportError>;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A scripted server reachable through [`LoopbackConnector`].
pub struct LoopbackServer {
    initialize: InitializeResult,
    handshake_error: Mutex<Option<String>>,
    /// The last queued reply of a method is sticky
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    /// Paginated listings: method -> (item key, pages)
    pages: Mutex<HashMap<String, (String, Vec<Vec<Value>>)>>,
    sent: Mutex<Vec<OutboundRequest>>,
    notified: Mutex<Vec<(String, Option<Value>)>>,
    open_count: AtomicUsize,
    close_count: AtomicUsize,
    next_session: AtomicU64,
    inbound: Mutex<Option<(u64, mpsc::UnboundedSender<InboundMessage>)>>,
    handshake_gate: watch::Sender<bool>,
    reply_gate: watch::Sender<bool>,
}

impl LoopbackServer {
    /// A server advertising every capability.
    pub fn new(name: &str) -> Self {
        let capabilities = ServerCapabilities {
            tools: Some(json!({})),
            resources: Some(json!({"subscribe": true})),
            prompts: Some(json!({})),
            logging: Some(json!({})),
            completions: Some(json!({})),
        };
        Self::with_capabilities(name, capabilities)
    }

    pub fn with_capabilities(name: &str, capabilities: ServerCapabilities) -> Self {
        let initialize = InitializeResult {
            protocol_version: mcpi_core::DEFAULT_PROTOCOL_VERSION.to_string(),
            server_info: Implementation {
                name: name.to_string(),
                version: Some("1.0.0".to_string()),
            },
            capabilities,
            instructions: None,
        };
        Self {
            initialize,
            handshake_error: Mutex::new(None),
            replies: Mutex::new(HashMap::new()),
            pages: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            notified: Mutex::new(Vec::new()),
            open_count: AtomicUsize::new(0),
            close_count: AtomicUsize::new(0),
            next_session: AtomicU64::new(0),
            inbound: Mutex::new(None),
            handshake_gate: watch::Sender::new(true),
            reply_gate: watch::Sender::new(true),
        }
    }

    /// Make every subsequent handshake fail with `message`.
    pub fn fail_handshake(&self, message: &str) {
        *lock(&self.handshake_error) = Some(message.to_string());
    }

    /// Undo [`LoopbackServer::fail_handshake`].
    pub fn heal_handshake(&self) {
        lock(&self.handshake_error).take();
    }

    /// Queue a successful reply for `method`.
    pub fn reply(&self, method: &str, result: Value) {
        self.push_reply(method, Ok(result));
    }

    /// Queue an error reply for `method`.
    pub fn reply_error(&self, method: &str, error: TransportError) {
        self.push_reply(method, Err(error));
    }

    fn push_reply(&self, method: &str, reply: Reply) {
        lock(&self.replies)
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Serve `method` as a paginated listing under `item_key`.
    ///
    /// The page is picked by the request cursor: none for the first page,
    /// then `c1`, `c2`, ... as announced in each reply's `nextCursor`.
    pub fn paginate(&self, method: &str, item_key: &str, pages: Vec<Vec<Value>>) {
        lock(&self.pages).insert(method.to_string(), (item_key.to_string(), pages));
    }

    fn respond(&self, request: &OutboundRequest) -> Reply {
        self.paged_reply(request)
            .unwrap_or_else(|| self.next_reply(&request.method))
    }

    fn paged_reply(&self, request: &OutboundRequest) -> Option<Reply> {
        let pages = lock(&self.pages);
        let (item_key, pages) = pages.get(&request.method)?;

        let cursor = request
            .params
            .as_ref()
            .and_then(|params| params.get("cursor"))
            .and_then(Value::as_str);
        let index = match cursor {
            None => 0,
            Some(cursor) => match cursor.strip_prefix('c').and_then(|n| n.parse::<usize>().ok()) {
                Some(n) if n < pages.len() => n,
                _ => {
                    return Some(Err(TransportError::Rpc(RpcError::new(
                        -32602,
                        format!("Invalid cursor: {cursor}"),
                    ))));
                }
            },
        };

        let mut result = serde_json::Map::new();
        result.insert(
            item_key.clone(),
            Value::Array(pages.get(index).cloned().unwrap_or_default()),
        );
        if index + 1 < pages.len() {
            result.insert("nextCursor".to_string(), json!(format!("c{}", index + 1)));
        }
        Some(Ok(Value::Object(result)))
    }

    fn next_reply(&self, method: &str) -> Reply {
        let mut replies = lock(&self.replies);
        match replies.get_mut(method) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Closed)),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(TransportError::Rpc(RpcError::method_not_found(method)))),
            None => Err(TransportError::Rpc(RpcError::method_not_found(method))),
        }
    }

    /// Hold handshakes open until [`LoopbackServer::release_handshake`].
    pub fn hold_handshake(&self) {
        self.handshake_gate.send_replace(false);
    }

    pub fn release_handshake(&self) {
        self.handshake_gate.send_replace(true);
    }

    /// Hold request replies until [`LoopbackServer::release_replies`].
    pub fn hold_replies(&self) {
        self.reply_gate.send_replace(false);
    }

    pub fn release_replies(&self) {
        self.reply_gate.send_replace(true);
    }

    /// Number of sessions opened so far.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Number of sessions closed so far.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn sent(&self) -> Vec<OutboundRequest> {
        lock(&self.sent).clone()
    }

    /// Requests received for `method`.
    pub fn sent_for(&self, method: &str) -> Vec<OutboundRequest> {
        lock(&self.sent)
            .iter()
            .filter(|request| request.method == method)
            .cloned()
            .collect()
    }

    pub fn notified(&self) -> Vec<(String, Option<Value>)> {
        lock(&self.notified).clone()
    }

    /// Push a message into the open session. Returns `false` when no
    /// session is open.
    pub fn push(&self, message: InboundMessage) -> bool {
        lock(&self.inbound)
            .as_ref()
            .is_some_and(|(_, tx)| tx.send(message).is_ok())
    }

    /// Send a server-initiated request and get the receiver of its answer.
    pub fn request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Option<oneshot::Receiver<Result<Value, RpcError>>> {
        let (responder, rx) = ResponseSender::channel();
        let delivered = self.push(InboundMessage::Request(ServerRequest {
            method: method.to_string(),
            params,
            responder,
        }));
        delivered.then_some(rx)
    }

    pub fn notify(&self, method: &str, params: Option<Value>) -> bool {
        self.push(InboundMessage::Notification {
            method: method.to_string(),
            params,
        })
    }

    /// End the open session from the server's side.
    pub fn close_from_server(&self, reason: &str) -> bool {
        let delivered = self.push(InboundMessage::Closed {
            reason: Some(reason.to_string()),
        });
        lock(&self.inbound).take();
        delivered
    }

    async fn open(self: &Arc<Self>) -> Result<OpenedSession, TransportError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.handshake_gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|_| TransportError::Closed)?;

        if let Some(message) = lock(&self.handshake_error).clone() {
            return Err(TransportError::Handshake(message));
        }
        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.inbound) = Some((id, tx));

        let session = LoopbackSession {
            id,
            server: Arc::clone(self),
            closed: AtomicBool::new(false),
        };
        Ok(OpenedSession {
            session: Arc::new(session),
            initialize: self.initialize.clone(),
            inbound: rx,
        })
    }
}

/// Session half of a [`LoopbackServer`].
pub struct LoopbackSession {
    id: u64,
    server: Arc<LoopbackServer>,
    closed: AtomicBool,
}

#[async_trait]
impl TransportSession for LoopbackSession {
    async fn send(&self, request: OutboundRequest) -> Result<Value, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        lock(&self.server.sent).push(request.clone());

        let mut gate = self.server.reply_gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|_| TransportError::Closed)?;

        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.server.respond(&request)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        lock(&self.server.notified).push((method.to_string(), params));
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.server.close_count.fetch_add(1, Ordering::SeqCst);
        let mut inbound = lock(&self.server.inbound);
        if inbound.as_ref().is_some_and(|(id, _)| *id == self.id) {
            inbound.take();
        }
    }
}

/// Routes connect attempts to registered [`LoopbackServer`]s.
#[derive(Default)]
pub struct LoopbackConnector {
    servers: Mutex<HashMap<String, Arc<LoopbackServer>>>,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `endpoint` (a stdio command or stream URL) with `server`.
    pub fn register(&self, endpoint: &str, server: Arc<LoopbackServer>) {
        lock(&self.servers).insert(endpoint.to_string(), server);
    }

    fn endpoint(config: &TransportConfig) -> &str {
        match config {
            TransportConfig::Stdio { command, .. } => command,
            TransportConfig::Stream { url, .. } => url,
        }
    }
}

#[async_trait]
impl TransportConnector for LoopbackConnector {
    async fn open(
        &self,
        config: &TransportConfig,
        _client: &ClientInfo,
    ) -> Result<OpenedSession, TransportError> {
        let endpoint = Self::endpoint(config);
        let server = lock(&self.servers).get(endpoint).cloned();
        match server {
            Some(server) => server.open().await,
            None => Err(TransportError::Open(format!(
                "nothing listening at {endpoint}"
            ))),
        }
    }
}
