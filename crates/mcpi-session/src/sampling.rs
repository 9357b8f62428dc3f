//! Operator approval queue for server-initiated sampling requests.
//!
//! Each queued request holds a single-use response handle. Approving or
//! rejecting removes the item under the queue lock before answering, so a
//! request is answered at most once and concurrent resolutions of the same
//! id are no-ops after the first.

use chrono::Utc;
use mcpi_core::{
    InspectorError, InspectorEvent, InspectorEventEmitter, PendingSamplingView, ResponseSender,
    RpcError, ServerId,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info};

struct PendingSampling {
    view: PendingSamplingView,
    responder: ResponseSender,
}

/// FIFO of sampling requests awaiting an operator decision.
pub struct SamplingQueue {
    next_id: AtomicU64,
    pending: Mutex<Vec<PendingSampling>>,
    emitter: Arc<dyn InspectorEventEmitter>,
}

impl SamplingQueue {
    pub fn new(emitter: Arc<dyn InspectorEventEmitter>) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(Vec::new()),
            emitter,
        }
    }

    /// Queue a request whose answer goes to `responder`. Returns its id.
    ///
    /// Ids start at 0 and are never reused.
    pub fn enqueue(&self, origin: ServerId, payload: Value, responder: ResponseSender) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let view = PendingSamplingView {
            id,
            origin_server_id: origin.clone(),
            payload,
            received_at: Utc::now(),
        };

        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PendingSampling { view, responder });

        info!(sampling_id = id, server_id = %origin, "Sampling request queued");
        self.emitter.emit(InspectorEvent::sampling_queued(id, origin));
        id
    }

    /// Queue a request and get the receiver its answer will arrive on.
    pub fn enqueue_awaitable(
        &self,
        origin: ServerId,
        payload: Value,
    ) -> (u64, oneshot::Receiver<Result<Value, RpcError>>) {
        let (responder, rx) = ResponseSender::channel();
        let id = self.enqueue(origin, payload, responder);
        (id, rx)
    }

    /// Queue a request and wait for the operator's decision.
    pub async fn request(&self, origin: ServerId, payload: Value) -> Result<Value, InspectorError> {
        let (id, rx) = self.enqueue_awaitable(origin, payload);
        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(rpc)) => Err(InspectorError::SamplingRejected(rpc.message)),
            Err(_) => Err(InspectorError::SamplingRejected(format!(
                "sampling request {id} was dropped"
            ))),
        }
    }

    fn take(&self, id: u64) -> Option<PendingSampling> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let index = pending.iter().position(|item| item.view.id == id)?;
        Some(pending.remove(index))
    }

    /// Answer request `id` with `result`. Unknown ids are a no-op.
    pub fn approve(&self, id: u64, result: Value) -> bool {
        let Some(item) = self.take(id) else {
            debug!(sampling_id = id, "Approve ignored, no such pending request");
            return false;
        };

        let delivered = item.responder.resolve(result);
        info!(sampling_id = id, server_id = %item.view.origin_server_id, delivered, "Sampling request approved");
        self.emitter.emit(InspectorEvent::sampling_resolved(
            id,
            item.view.origin_server_id,
            true,
        ));
        true
    }

    /// Answer request `id` with the operator-rejection error. Unknown ids are a no-op.
    pub fn reject(&self, id: u64, reason: Option<&str>) -> bool {
        let Some(item) = self.take(id) else {
            debug!(sampling_id = id, "Reject ignored, no such pending request");
            return false;
        };

        let delivered = item.responder.reject(RpcError::rejected_by_operator(reason));
        info!(sampling_id = id, server_id = %item.view.origin_server_id, delivered, "Sampling request rejected");
        self.emitter.emit(InspectorEvent::sampling_resolved(
            id,
            item.view.origin_server_id,
            false,
        ));
        true
    }

    /// Pending requests in arrival order.
    pub fn pending(&self) -> Vec<PendingSamplingView> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|item| item.view.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpi_core::{ChannelEmitter, NoopEmitter};
    use serde_json::json;

    fn queue() -> SamplingQueue {
        SamplingQueue::new(Arc::new(NoopEmitter::new()))
    }

    #[tokio::test]
    async fn test_approve_resolves_and_removes() {
        let queue = queue();
        let (id, rx) = queue.enqueue_awaitable(ServerId::new("a"), json!({"messages": []}));
        assert_eq!(id, 0);
        assert_eq!(queue.len(), 1);

        assert!(queue.approve(id, json!({"content": "ok"})));
        assert!(queue.is_empty());

        let answer = rx.await.unwrap().unwrap();
        assert_eq!(answer, json!({"content": "ok"}));
    }

    #[tokio::test]
    async fn test_second_resolution_is_noop() {
        let queue = queue();
        let (id, rx) = queue.enqueue_awaitable(ServerId::new("a"), json!({}));

        assert!(queue.approve(id, json!({"first": true})));
        assert!(!queue.approve(id, json!({"second": true})));
        assert!(!queue.reject(id, None));

        assert_eq!(rx.await.unwrap().unwrap(), json!({"first": true}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_racing_approve_and_reject_resolve_once() {
        let queue = Arc::new(queue());

        for _ in 0..100 {
            let (id, rx) = queue.enqueue_awaitable(ServerId::new("a"), json!({}));
            let barrier = Arc::new(tokio::sync::Barrier::new(2));

            let approve = tokio::spawn({
                let queue = Arc::clone(&queue);
                let barrier = Arc::clone(&barrier);
                async move {
                    barrier.wait().await;
                    queue.approve(id, json!({"approved": true}))
                }
            });
            let reject = tokio::spawn({
                let queue = Arc::clone(&queue);
                let barrier = Arc::clone(&barrier);
                async move {
                    barrier.wait().await;
                    queue.reject(id, None)
                }
            });

            let (approved, rejected) = (approve.await.unwrap(), reject.await.unwrap());
            assert!(approved ^ rejected);
            assert_eq!(rx.await.unwrap().is_ok(), approved);
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_reject_sends_operator_error() {
        let queue = queue();
        let (id, rx) = queue.enqueue_awaitable(ServerId::new("a"), json!({}));

        assert!(queue.reject(id, Some("not today")));
        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.code, -1);
        assert!(err.message.contains("not today"));
    }

    #[test]
    fn test_ids_are_monotonic_and_views_ordered() {
        let queue = queue();
        let (a, _rx_a) = queue.enqueue_awaitable(ServerId::new("a"), json!({"n": 1}));
        let (b, _rx_b) = queue.enqueue_awaitable(ServerId::new("b"), json!({"n": 2}));
        assert_eq!((a, b), (0, 1));

        let views = queue.pending();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].origin_server_id, ServerId::new("a"));
        assert_eq!(views[1].payload, json!({"n": 2}));

        queue.reject(a, None);
        let (c, _rx_c) = queue.enqueue_awaitable(ServerId::new("a"), json!({}));
        assert_eq!(c, 2);
    }

    #[tokio::test]
    async fn test_request_maps_rejection() {
        let queue = Arc::new(queue());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.request(ServerId::new("a"), json!({})).await })
        };

        while queue.is_empty() {
            tokio::task::yield_now().await;
        }
        queue.reject(0, Some("nope"));

        let result = waiter.await.unwrap();
        assert!(matches!(
            result,
            Err(InspectorError::SamplingRejected(msg)) if msg.contains("nope")
        ));
    }

    #[tokio::test]
    async fn test_queue_and_resolve_emit_events() {
        let emitter = ChannelEmitter::new();
        let mut rx = emitter.subscribe();
        let queue = SamplingQueue::new(Arc::new(emitter));

        let (id, _answer) = queue.enqueue_awaitable(ServerId::new("a"), json!({}));
        queue.approve(id, json!({}));

        assert_eq!(rx.recv().await.unwrap().event_name(), "sampling:queued");
        let resolved = rx.recv().await.unwrap();
        assert!(matches!(
            resolved,
            InspectorEvent::SamplingResolved { approved: true, .. }
        ));
    }
}
