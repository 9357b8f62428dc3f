//! Per-server connection state machine.
//!
//! `Stopped → Starting → Running`, `Starting → Failed`, `Running → Failed`,
//! `Running → Stopped`, `Failed → Starting`. Every state is re-enterable.
//!
//! Transitions for one connection are serialized by an async transition
//! lock, held only while state is flipped and never across the handshake.
//! A generation counter lets a disconnect issued mid-handshake win: the
//! late handshake result is discarded and its session closed.

use mcpi_core::{
    CallToolResult, CapabilitySet, Category, GetPromptResult, Implementation, InspectorError,
    InspectorEvent, OpenedSession, ReadResourceResult, ServerId, ServerSpec, ServerStatus,
    StatusChange, ToolDescriptor, TransportConfig, TransportKind, TransportSession,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::SessionContext;
use crate::inbound;
use crate::pagination::PaginationStore;

/// Receives every state transition of every connection, synchronously and
/// in transition order per connection.
pub trait StatusObserver: Send + Sync {
    fn on_status_change(&self, change: &StatusChange);
}

/// Handle to the session of a `Running` connection.
#[derive(Clone)]
pub(crate) struct LiveSession {
    pub(crate) session: Arc<dyn TransportSession>,
    /// Cancelled when the session goes away, failing in-flight requests
    pub(crate) cancel: CancellationToken,
    pub(crate) generation: u64,
}

/// Single-value read results, overwritten by each new read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSlots {
    /// Last `resources/read` result, with the URI it was read from
    pub resource: Option<(String, ReadResourceResult)>,
    /// Last `prompts/get` result, with the prompt name
    pub prompt: Option<(String, GetPromptResult)>,
    /// Last `tools/call` result, with the tool name
    pub tool_result: Option<(String, CallToolResult)>,
}

/// Point-in-time view of one connection for display layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub id: ServerId,
    pub label: String,
    pub transport: TransportKind,
    pub status: ServerStatus,
    pub capabilities: CapabilitySet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<Implementation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub tools: Vec<ToolDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub category_errors: BTreeMap<Category, String>,
    pub content: ContentSlots,
}

#[derive(Default)]
pub(crate) struct ConnectionState {
    pub(crate) status: ServerStatus,
    pub(crate) capabilities: CapabilitySet,
    pub(crate) server_info: Option<Implementation>,
    pub(crate) instructions: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) session: Option<LiveSession>,
    pub(crate) pagination: PaginationStore,
    pub(crate) content: ContentSlots,
    pub(crate) category_errors: BTreeMap<Category, String>,
}

impl ConnectionState {
    /// Drop everything learned from the current session.
    fn clear_session_data(&mut self) {
        self.session = None;
        self.capabilities = CapabilitySet::empty();
        self.server_info = None;
        self.instructions = None;
        self.pagination.clear_all();
        self.content = ContentSlots::default();
        self.category_errors.clear();
    }
}

/// One tracked server and its lifecycle.
pub(crate) struct Connection {
    id: ServerId,
    label: String,
    transport: TransportConfig,
    pub(crate) ctx: Arc<SessionContext>,
    observer: Weak<dyn StatusObserver>,
    transition: Mutex<()>,
    state: RwLock<ConnectionState>,
    generation: AtomicU64,
    progress: AtomicU64,
}

impl Connection {
    pub(crate) fn new(
        spec: ServerSpec,
        ctx: Arc<SessionContext>,
        observer: Weak<dyn StatusObserver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            label: spec.display_label(),
            id: spec.id,
            transport: spec.transport,
            ctx,
            observer,
            transition: Mutex::new(()),
            state: RwLock::new(ConnectionState::default()),
            generation: AtomicU64::new(0),
            progress: AtomicU64::new(0),
        })
    }

    pub(crate) const fn id(&self) -> &ServerId {
        &self.id
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, ConnectionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ConnectionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn status(&self) -> ServerStatus {
        self.read().status
    }

    pub(crate) fn tool_count(&self) -> usize {
        let state = self.read();
        if state.status.is_running() {
            state.pagination.tools().len()
        } else {
            0
        }
    }

    pub(crate) fn snapshot(&self) -> ConnectionSnapshot {
        let state = self.read();
        ConnectionSnapshot {
            id: self.id.clone(),
            label: self.label.clone(),
            transport: self.transport.kind(),
            status: state.status,
            capabilities: state.capabilities,
            server_info: state.server_info.clone(),
            instructions: state.instructions.clone(),
            tools: state.pagination.tools(),
            error: state.error.clone(),
            category_errors: state.category_errors.clone(),
            content: state.content.clone(),
        }
    }

    /// Session handle, only while `Running`.
    pub(crate) fn live_session(&self) -> Option<LiveSession> {
        let state = self.read();
        if state.status.is_running() {
            state.session.clone()
        } else {
            None
        }
    }

    /// Whether `generation` still names the open session.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        let state = self.read();
        state.status.is_running()
            && state
                .session
                .as_ref()
                .is_some_and(|live| live.generation == generation)
    }

    /// Run `update` only if `generation` is still the open session.
    pub(crate) fn update_if_current(
        &self,
        generation: u64,
        update: impl FnOnce(&mut ConnectionState),
    ) -> bool {
        let mut state = self.write();
        let current = state.status.is_running()
            && state
                .session
                .as_ref()
                .is_some_and(|live| live.generation == generation);
        if current {
            update(&mut state);
        }
        current
    }

    pub(crate) fn capabilities(&self) -> CapabilitySet {
        self.read().capabilities
    }

    /// Allocate the next progress token. Never reset, so tokens are never
    /// reused across reconnects.
    pub(crate) fn next_progress_token(&self) -> u64 {
        self.progress.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Open a session and run the handshake.
    ///
    /// No-op while `Starting` or `Running`. Failures are recorded on the
    /// connection (`Failed` + error), never returned.
    pub(crate) async fn connect(self: &Arc<Self>) -> ServerStatus {
        let generation = {
            let _guard = self.transition.lock().await;
            let from = self.status();
            if !from.can_connect() {
                debug!(server_id = %self.id, status = %from, "Connect ignored");
                return from;
            }

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            {
                let mut state = self.write();
                state.status = ServerStatus::Starting;
                state.error = None;
                state.category_errors.clear();
            }
            self.publish(StatusChange::new(
                self.id.clone(),
                from,
                ServerStatus::Starting,
            ));
            generation
        };

        debug!(server_id = %self.id, transport = ?self.transport, "Opening transport session");
        let outcome = self
            .ctx
            .connector
            .open(&self.transport, &self.ctx.client_info)
            .await;

        let _guard = self.transition.lock().await;
        let superseded = self.generation.load(Ordering::SeqCst) != generation
            || self.status() != ServerStatus::Starting;
        if superseded {
            debug!(server_id = %self.id, "Discarding handshake result of superseded connect");
            if let Ok(opened) = outcome {
                opened.session.close().await;
            }
            return self.status();
        }

        match outcome {
            Ok(OpenedSession {
                session,
                initialize,
                inbound,
            }) => {
                let capabilities =
                    CapabilitySet::from_server_capabilities(&initialize.capabilities);
                let cancel = CancellationToken::new();
                {
                    let mut state = self.write();
                    state.status = ServerStatus::Running;
                    state.error = None;
                    state.capabilities = capabilities;
                    state.server_info = Some(initialize.server_info.clone());
                    state.instructions.clone_from(&initialize.instructions);
                    state.session = Some(LiveSession {
                        session,
                        cancel: cancel.clone(),
                        generation,
                    });
                }

                info!(
                    server_id = %self.id,
                    server_name = %initialize.server_info.name,
                    protocol_version = %initialize.protocol_version,
                    capabilities = ?capabilities.names(),
                    "MCP server connected"
                );

                inbound::spawn_pump(Arc::downgrade(self), generation, cancel, inbound);
                self.publish(StatusChange::new(
                    self.id.clone(),
                    ServerStatus::Starting,
                    ServerStatus::Running,
                ));
                ServerStatus::Running
            }
            Err(e) => {
                let error = InspectorError::HandshakeFailed {
                    server_id: self.id.clone(),
                    message: e.to_string(),
                };
                warn!(server_id = %self.id, error = %error, "MCP server connect failed");

                let message = e.to_string();
                {
                    let mut state = self.write();
                    state.clear_session_data();
                    state.status = ServerStatus::Failed;
                    state.error = Some(message.clone());
                }
                self.publish(StatusChange::failed(
                    self.id.clone(),
                    ServerStatus::Starting,
                    message,
                ));
                ServerStatus::Failed
            }
        }
    }

    /// Close the session (if any) and move to `Stopped`. Idempotent.
    pub(crate) async fn disconnect(&self) {
        let _guard = self.transition.lock().await;
        // Invalidates a handshake that is still in flight
        self.generation.fetch_add(1, Ordering::SeqCst);

        let (from, live) = {
            let mut state = self.write();
            let from = state.status;
            let live = state.session.take();
            state.clear_session_data();
            state.status = ServerStatus::Stopped;
            state.error = None;
            (from, live)
        };

        if let Some(live) = live {
            live.cancel.cancel();
            live.session.close().await;
        }

        if from != ServerStatus::Stopped {
            info!(server_id = %self.id, from = %from, "MCP server disconnected");
            self.publish(StatusChange::new(
                self.id.clone(),
                from,
                ServerStatus::Stopped,
            ));
        }
    }

    /// The transport reported that session `generation` ended.
    ///
    /// Moves a `Running` connection to `Failed`; ignored when the session
    /// was already replaced or closed locally.
    pub(crate) async fn fail_session(&self, generation: u64, reason: String) {
        let _guard = self.transition.lock().await;
        if !self.is_current(generation) {
            return;
        }

        let live = {
            let mut state = self.write();
            let live = state.session.take();
            state.clear_session_data();
            state.status = ServerStatus::Failed;
            state.error = Some(reason.clone());
            live
        };

        if let Some(live) = live {
            live.cancel.cancel();
            live.session.close().await;
        }

        warn!(server_id = %self.id, reason = %reason, "MCP server session lost");
        self.publish(StatusChange::failed(
            self.id.clone(),
            ServerStatus::Running,
            reason,
        ));
    }

    /// Deliver a transition to the emitter and then to the observer.
    ///
    /// Called with the transition lock held, which keeps events for one
    /// connection in transition order.
    fn publish(&self, change: StatusChange) {
        self.ctx
            .emitter
            .emit(InspectorEvent::status_changed(change.clone()));
        if let Some(observer) = self.observer.upgrade() {
            observer.on_status_change(&change);
        }
    }
}
