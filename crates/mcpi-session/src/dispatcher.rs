//! Request dispatch: send one envelope over a live session, validate the
//! response, and keep per-category error state in step with the outcome.

use mcpi_core::{
    Category, ErrorInfo, InspectorError, InspectorEvent, ListCategory, ListItem, ListPage,
    OutboundRequest, ProgressToken, RequestEnvelope, TransportError, TypedResponse,
};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::history::HistoryEntry;
use crate::pagination::PaginationState;

/// Method that gets a fresh progress token when the caller supplied none.
const TOOLS_CALL: &str = "tools/call";

impl Connection {
    /// Dispatch `envelope` on this connection.
    ///
    /// Never reaches the transport unless the connection is `Running`. A
    /// disconnect while the request is in flight resolves it with
    /// `ConnectionClosed`.
    pub(crate) async fn dispatch(
        &self,
        envelope: RequestEnvelope,
    ) -> Result<TypedResponse, InspectorError> {
        self.dispatch_tracked(envelope).await.map(|(response, _)| response)
    }

    /// Like [`Connection::dispatch`], also returning the session generation
    /// the response came from.
    pub(crate) async fn dispatch_tracked(
        &self,
        mut envelope: RequestEnvelope,
    ) -> Result<(TypedResponse, u64), InspectorError> {
        let category = envelope.category;

        let Some(live) = self.live_session() else {
            let error = InspectorError::NotConnected(self.id().clone());
            debug!(server_id = %self.id(), method = %envelope.method, "Dispatch refused, not connected");
            self.record_outcome(category, Some(&error));
            return Err(error);
        };

        if envelope.method == TOOLS_CALL && envelope.progress_token().is_none() {
            envelope = envelope.with_progress_token(ProgressToken(self.next_progress_token()));
        }

        debug!(
            server_id = %self.id(),
            method = %envelope.method,
            category = %category,
            "Dispatching request"
        );

        let request = OutboundRequest {
            method: envelope.method.clone(),
            params: envelope.params.clone(),
        };

        let sent = tokio::select! {
            biased;
            () = live.cancel.cancelled() => {
                Err(InspectorError::ConnectionClosed(self.id().clone()))
            }
            result = live.session.send(request) => result.map_err(|source| match source {
                TransportError::Closed => InspectorError::ConnectionClosed(self.id().clone()),
                source => InspectorError::Transport {
                    method: envelope.method.clone(),
                    source,
                },
            }),
        };

        let shape = envelope.expected_shape;
        let outcome = sent.and_then(|raw| match self.ctx.validator.validate(&raw, shape) {
            Ok(typed) if typed.matches(shape) => Ok((typed, raw)),
            Ok(_) => Err(InspectorError::InvalidResponseShape {
                method: envelope.method.clone(),
                message: format!("validator produced a response other than {shape:?}"),
                raw,
            }),
            Err(e) => Err(InspectorError::InvalidResponseShape {
                method: envelope.method.clone(),
                message: e.message,
                raw,
            }),
        });

        match outcome {
            Ok((typed, raw)) => {
                self.record_outcome(category, None);
                self.ctx
                    .history
                    .record(HistoryEntry::success(self.id().clone(), &envelope, raw));
                Ok((typed, live.generation))
            }
            Err(error) => {
                warn!(server_id = %self.id(), method = %envelope.method, error = %error, "Request failed");
                self.record_outcome(category, Some(&error));
                self.ctx
                    .history
                    .record(HistoryEntry::failure(self.id().clone(), &envelope, &error));
                Err(error)
            }
        }
    }

    /// Set or clear the error recorded for `category`.
    ///
    /// Only emits when the recorded value actually changes. `Category::None`
    /// has no error state.
    fn record_outcome(&self, category: Category, error: Option<&InspectorError>) {
        if category == Category::None {
            return;
        }

        let changed = {
            let mut state = self.write();
            match error {
                Some(error) => {
                    let message = error.to_string();
                    let previous = state.category_errors.insert(category, message.clone());
                    (previous.as_deref() != Some(message.as_str())).then_some(Some(message))
                }
                None => state.category_errors.remove(&category).map(|_| None),
            }
        };

        if let Some(message) = changed {
            let info = message.map(|m| ErrorInfo::for_category(self.id().clone(), category, m));
            self.ctx.emitter.emit(InspectorEvent::category_error_changed(
                self.id().clone(),
                category,
                info,
            ));
        }
    }

    pub(crate) fn category_error(&self, category: Category) -> Option<String> {
        self.read().category_errors.get(&category).cloned()
    }

    /// Fetch the next page of `category`, continuing from the stored cursor.
    ///
    /// The page is appended only if the session it came from is still the
    /// open one.
    pub(crate) async fn list_page(
        &self,
        category: ListCategory,
    ) -> Result<ListPage<ListItem>, InspectorError> {
        let cursor = self.read().pagination.cursor(category);
        let envelope = RequestEnvelope::list(category, cursor.as_deref());
        let method = envelope.method.clone();

        let (response, generation) = self.dispatch_tracked(envelope).await?;
        let page = response
            .into_list_page()
            .ok_or_else(|| InspectorError::InvalidResponseShape {
                message: format!("expected a {category:?} page"),
                method,
                raw: serde_json::Value::Null,
            })?;

        self.update_if_current(generation, |state| {
            state.pagination.append(category, page.clone());
        });

        debug!(
            server_id = %self.id(),
            category = ?category,
            items = page.items.len(),
            has_more = page.next_cursor.is_some(),
            "Fetched list page"
        );
        Ok(page)
    }

    pub(crate) fn clear_list(&self, category: ListCategory) {
        self.write().pagination.clear(category);
    }

    pub(crate) fn pagination(&self, category: ListCategory) -> PaginationState {
        self.read().pagination.get(category)
    }
}
