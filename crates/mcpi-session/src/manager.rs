//! Multi-server connection manager.
//!
//! Owns every [`Connection`], the operator's selection, the derived active
//! set and the outer link status. The active set is reconciled
//! synchronously inside the status observer, so it only ever names
//! `Running` connections.

use futures_util::future::join_all;
use mcpi_core::{
    AutoActivatePolicy, Category, InspectorError, InspectorEvent, InspectorEventEmitter,
    InspectorSettings, LinkStatus, ListCategory, ListItem, ListPage, NoopEmitter,
    PendingSamplingView, RequestEnvelope, ServerId, ServerSpec, ServerStatus, ShapeValidator,
    StatusChange, TransportConnector, TypedResponse, validate_settings,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionSnapshot, StatusObserver};
use crate::context::SessionContext;
use crate::history::RequestHistory;
use crate::notifications::NotificationLog;
use crate::pagination::PaginationState;
use crate::sampling::SamplingQueue;
use crate::validator::SerdeShapeValidator;

/// Builder for [`ConnectionManager`].
pub struct ConnectionManagerBuilder {
    connector: Arc<dyn TransportConnector>,
    settings: InspectorSettings,
    validator: Option<Arc<dyn ShapeValidator>>,
    emitter: Option<Arc<dyn InspectorEventEmitter>>,
    servers: Vec<ServerSpec>,
}

impl ConnectionManagerBuilder {
    #[must_use]
    pub fn settings(mut self, settings: InspectorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Response validator. Defaults to [`SerdeShapeValidator`].
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn ShapeValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Event sink. Defaults to [`NoopEmitter`].
    #[must_use]
    pub fn emitter(mut self, emitter: Arc<dyn InspectorEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    #[must_use]
    pub fn server(mut self, spec: ServerSpec) -> Self {
        self.servers.push(spec);
        self
    }

    #[must_use]
    pub fn servers(mut self, specs: impl IntoIterator<Item = ServerSpec>) -> Self {
        self.servers.extend(specs);
        self
    }

    pub fn build(self) -> Result<ConnectionManager, InspectorError> {
        validate_settings(&self.settings)
            .map_err(|e| InspectorError::InvalidConfig(e.to_string()))?;

        let emitter: Arc<dyn InspectorEventEmitter> = match self.emitter {
            Some(emitter) => emitter,
            None => Arc::new(NoopEmitter::new()),
        };
        let validator: Arc<dyn ShapeValidator> = match self.validator {
            Some(validator) => validator,
            None => Arc::new(SerdeShapeValidator::new()),
        };

        let ctx = Arc::new(SessionContext {
            connector: self.connector,
            validator,
            emitter: Arc::clone(&emitter),
            client_info: self.settings.client_info(),
            roots: self.settings.roots.clone(),
            sampling: Arc::new(SamplingQueue::new(Arc::clone(&emitter))),
            notifications: Arc::new(NotificationLog::new(Arc::clone(&emitter))),
            history: Arc::new(RequestHistory::new(self.settings.effective_history_limit())),
        });

        let state = Arc::new(ManagerState {
            connections: RwLock::new(BTreeMap::new()),
            selected: Mutex::new(BTreeSet::new()),
            active: Mutex::new(Vec::new()),
            link: RwLock::new(self.settings.effective_initial_link_status()),
            policy: self.settings.effective_auto_activate(),
            observers: RwLock::new(Vec::new()),
            emitter,
        });

        let manager = ConnectionManager { state, ctx };
        for spec in self.servers {
            manager.add_server(spec)?;
        }

        info!(
            servers = manager.server_ids().len(),
            policy = ?manager.state.policy,
            "Connection manager ready"
        );
        Ok(manager)
    }
}

/// State shared between the manager handle and the status observer hook.
struct ManagerState {
    connections: RwLock<BTreeMap<ServerId, Arc<Connection>>>,
    /// Servers the operator asked for, whether or not they are up yet
    selected: Mutex<BTreeSet<ServerId>>,
    /// Selected-and-running servers, in activation order
    active: Mutex<Vec<ServerId>>,
    link: RwLock<LinkStatus>,
    policy: AutoActivatePolicy,
    observers: RwLock<Vec<Arc<dyn StatusObserver>>>,
    emitter: Arc<dyn InspectorEventEmitter>,
}

impl ManagerState {
    fn selected(&self) -> std::sync::MutexGuard<'_, BTreeSet<ServerId>> {
        self.selected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Vec<ServerId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `update` to the active set and emit if it changed.
    fn update_active(&self, update: impl FnOnce(&mut Vec<ServerId>)) {
        let changed = {
            let mut active = self.active();
            let before = active.clone();
            update(&mut active);
            (*active != before).then(|| active.clone())
        };

        if let Some(active) = changed {
            debug!(active = ?active, "Active set changed");
            self.emitter
                .emit(InspectorEvent::active_set_changed(active));
        }
    }

    /// Add `connection` to the active set if it is `Running` right now.
    fn mark_active(&self, connection: &Connection) {
        self.update_active(|active| {
            if connection.status().is_running() && !active.contains(connection.id()) {
                active.push(connection.id().clone());
            }
        });
    }

    fn remove_active(&self, id: &ServerId) {
        self.update_active(|active| active.retain(|a| a != id));
    }
}

impl StatusObserver for ManagerState {
    fn on_status_change(&self, change: &StatusChange) {
        let id = &change.server_id;
        if change.to.is_running() {
            let wanted =
                self.policy == AutoActivatePolicy::OnRunning || self.selected().contains(id);
            if wanted {
                self.update_active(|active| {
                    if !active.contains(id) {
                        active.push(id.clone());
                    }
                });
            }
        } else {
            self.remove_active(id);
        }

        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_status_change(change);
        }
    }
}

/// Entry point of the orchestration layer.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ConnectionManager {
    state: Arc<ManagerState>,
    ctx: Arc<SessionContext>,
}

impl ConnectionManager {
    pub fn builder(connector: Arc<dyn TransportConnector>) -> ConnectionManagerBuilder {
        ConnectionManagerBuilder {
            connector,
            settings: InspectorSettings::with_defaults(),
            validator: None,
            emitter: None,
            servers: Vec::new(),
        }
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Track a new server, initially `Stopped`.
    pub fn add_server(&self, spec: ServerSpec) -> Result<(), InspectorError> {
        spec.transport
            .validate()
            .map_err(|e| InspectorError::InvalidConfig(format!("{}: {e}", spec.id)))?;

        let mut connections = self
            .state
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if connections.contains_key(&spec.id) {
            return Err(InspectorError::DuplicateServer(spec.id));
        }

        let observer: Weak<ManagerState> = Arc::downgrade(&self.state);
        let observer: Weak<dyn StatusObserver> = observer;
        let id = spec.id.clone();
        debug!(server_id = %id, transport = ?spec.transport.kind(), "Server added");
        connections.insert(id, Connection::new(spec, Arc::clone(&self.ctx), observer));
        Ok(())
    }

    /// Deactivate and forget a server.
    pub async fn remove_server(&self, id: &ServerId) -> Result<(), InspectorError> {
        self.deactivate(id).await?;
        self.state
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        debug!(server_id = %id, "Server removed");
        Ok(())
    }

    pub fn server_ids(&self) -> Vec<ServerId> {
        self.state
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub(crate) fn connection(&self, id: &ServerId) -> Result<Arc<Connection>, InspectorError> {
        self.state
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| InspectorError::UnknownServer(id.clone()))
    }

    fn all_connections(&self) -> Vec<Arc<Connection>> {
        self.state
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn snapshot(&self, id: &ServerId) -> Result<ConnectionSnapshot, InspectorError> {
        Ok(self.connection(id)?.snapshot())
    }

    pub fn snapshots(&self) -> Vec<ConnectionSnapshot> {
        self.all_connections()
            .iter()
            .map(|connection| connection.snapshot())
            .collect()
    }

    pub fn status(&self, id: &ServerId) -> Result<ServerStatus, InspectorError> {
        Ok(self.connection(id)?.status())
    }

    /// Register an observer for every connection's transitions.
    ///
    /// Observers run synchronously after the manager has reconciled its
    /// active set, so they see the updated set.
    pub fn subscribe_status(&self, observer: Arc<dyn StatusObserver>) {
        self.state
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    // =========================================================================
    // Link status
    // =========================================================================

    pub fn link_status(&self) -> LinkStatus {
        *self.state.link.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the status of the control link reported by the embedding layer.
    pub fn set_link_status(&self, status: LinkStatus) {
        let previous = std::mem::replace(
            &mut *self.state.link.write().unwrap_or_else(PoisonError::into_inner),
            status,
        );
        if previous != status {
            info!(from = %previous, to = %status, "Link status changed");
            self.ctx
                .emitter
                .emit(InspectorEvent::link_status_changed(status));
        }
    }

    pub(crate) fn ensure_link_open(&self) -> Result<(), InspectorError> {
        match self.link_status() {
            LinkStatus::Open => Ok(()),
            other => Err(InspectorError::LinkUnavailable(other)),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connect one server without selecting it. Connect failures are
    /// reported through the returned status, not as errors.
    pub async fn connect(&self, id: &ServerId) -> Result<ServerStatus, InspectorError> {
        self.ensure_link_open()?;
        let connection = self.connection(id)?;
        Ok(connection.connect().await)
    }

    /// Disconnect one server without changing the selection.
    pub async fn disconnect(&self, id: &ServerId) -> Result<(), InspectorError> {
        self.connection(id)?.disconnect().await;
        Ok(())
    }

    /// Select a server and bring it up.
    ///
    /// `Running` servers join the active set at once; `Stopped` and `Failed`
    /// ones are connected first and join when they reach `Running`. A failed
    /// connect leaves the server selected but inactive, with its error
    /// recorded on the connection.
    pub async fn activate(&self, id: &ServerId) -> Result<(), InspectorError> {
        self.ensure_link_open()?;
        let connection = self.connection(id)?;
        self.state.selected().insert(id.clone());

        match connection.status() {
            ServerStatus::Running => self.state.mark_active(&connection),
            ServerStatus::Starting => {
                debug!(server_id = %id, "Activation pending, connect already in flight");
            }
            ServerStatus::Stopped | ServerStatus::Failed => {
                let status = connection.connect().await;
                // Covers the Explicit policy racing a connect started elsewhere
                if status.is_running() {
                    self.state.mark_active(&connection);
                }
            }
        }
        Ok(())
    }

    /// Deselect a server and disconnect it. Always ends `Stopped` and inactive.
    pub async fn deactivate(&self, id: &ServerId) -> Result<(), InspectorError> {
        let connection = self.connection(id)?;
        self.state.selected().remove(id);
        connection.disconnect().await;
        self.state.remove_active(id);
        Ok(())
    }

    /// Activate every tracked server concurrently.
    pub async fn select_all(&self) -> Result<(), InspectorError> {
        self.ensure_link_open()?;
        let ids = self.server_ids();
        info!(servers = ids.len(), "Selecting all servers");

        let results = join_all(ids.iter().map(|id| self.activate(id))).await;
        results.into_iter().collect()
    }

    /// Deactivate every active or selected server concurrently.
    pub async fn deselect_all(&self) {
        let mut ids: BTreeSet<ServerId> = self.state.selected().iter().cloned().collect();
        ids.extend(self.state.active().iter().cloned());
        info!(servers = ids.len(), "Deselecting all servers");

        join_all(ids.iter().map(|id| async move {
            // Ids come from the registry; a concurrent remove makes this a no-op
            let _ = self.deactivate(id).await;
        }))
        .await;
    }

    /// Disconnect everything, leaving the selection untouched.
    pub async fn shutdown(&self) {
        let connections = self.all_connections();
        info!(servers = connections.len(), "Shutting down all connections");
        join_all(connections.iter().map(|connection| connection.disconnect())).await;
    }

    // =========================================================================
    // Aggregation
    // =========================================================================

    /// Active servers in activation order.
    pub fn active_server_ids(&self) -> Vec<ServerId> {
        self.state.active().clone()
    }

    pub fn active_count(&self) -> usize {
        self.state.active().len()
    }

    pub fn is_active(&self, id: &ServerId) -> bool {
        self.state.active().contains(id)
    }

    /// Sum of accumulated tools over active `Running` connections.
    pub fn total_tools(&self) -> usize {
        self.active_server_ids()
            .iter()
            .filter_map(|id| self.connection(id).ok())
            .map(|connection| connection.tool_count())
            .sum()
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Dispatch an arbitrary request envelope to one server.
    pub async fn dispatch(
        &self,
        id: &ServerId,
        envelope: RequestEnvelope,
    ) -> Result<TypedResponse, InspectorError> {
        self.ensure_link_open()?;
        self.connection(id)?.dispatch(envelope).await
    }

    /// Fetch the next page of a listing and append it to the cursor store.
    pub async fn list_page(
        &self,
        id: &ServerId,
        category: ListCategory,
    ) -> Result<ListPage<ListItem>, InspectorError> {
        self.ensure_link_open()?;
        self.connection(id)?.list_page(category).await
    }

    /// Reset one listing's accumulated items and cursor.
    pub fn clear_list(&self, id: &ServerId, category: ListCategory) -> Result<(), InspectorError> {
        self.connection(id)?.clear_list(category);
        Ok(())
    }

    pub fn pagination(
        &self,
        id: &ServerId,
        category: ListCategory,
    ) -> Result<PaginationState, InspectorError> {
        Ok(self.connection(id)?.pagination(category))
    }

    /// Last error recorded for `category` on one server.
    pub fn category_error(
        &self,
        id: &ServerId,
        category: Category,
    ) -> Result<Option<String>, InspectorError> {
        Ok(self.connection(id)?.category_error(category))
    }

    // =========================================================================
    // Sampling, notifications, history
    // =========================================================================

    pub fn sampling(&self) -> &SamplingQueue {
        &self.ctx.sampling
    }

    pub fn pending_sampling(&self) -> Vec<PendingSamplingView> {
        self.ctx.sampling.pending()
    }

    pub fn approve_sampling(&self, id: u64, result: Value) -> bool {
        self.ctx.sampling.approve(id, result)
    }

    pub fn reject_sampling(&self, id: u64, reason: Option<&str>) -> bool {
        self.ctx.sampling.reject(id, reason)
    }

    pub fn notifications(&self) -> &NotificationLog {
        &self.ctx.notifications
    }

    pub fn history(&self) -> &RequestHistory {
        &self.ctx.history
    }
}
