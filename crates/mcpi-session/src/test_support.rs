//! Shared fixtures for unit tests.

use mcpi_core::{
    InspectorSettings, NoopEmitter, ServerSpec, ShapeValidator, StatusChange, TransportConfig,
};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::connection::{Connection, StatusObserver};
use crate::context::SessionContext;
use crate::history::RequestHistory;
use crate::loopback::{LoopbackConnector, LoopbackServer};
use crate::notifications::NotificationLog;
use crate::sampling::SamplingQueue;
use crate::validator::SerdeShapeValidator;

/// Records every transition it observes.
#[derive(Default)]
pub(crate) struct Recorder {
    changes: Mutex<Vec<StatusChange>>,
}

impl Recorder {
    pub(crate) fn changes(&self) -> Vec<StatusChange> {
        self.changes.lock().unwrap().clone()
    }
}

impl StatusObserver for Recorder {
    fn on_status_change(&self, change: &StatusChange) {
        self.changes.lock().unwrap().push(change.clone());
    }
}

pub(crate) struct Fixture {
    pub(crate) server: Arc<LoopbackServer>,
    pub(crate) recorder: Arc<Recorder>,
    pub(crate) connection: Arc<Connection>,
}

/// One connection to one loopback server, with a recording observer.
pub(crate) fn fixture() -> Fixture {
    fixture_with_validator(Arc::new(SerdeShapeValidator::new()))
}

/// Like [`fixture`], validating responses with `validator`.
pub(crate) fn fixture_with_validator(validator: Arc<dyn ShapeValidator>) -> Fixture {
    let server = Arc::new(LoopbackServer::new("everything"));
    let connector = LoopbackConnector::new();
    connector.register("everything", Arc::clone(&server));

    let emitter = Arc::new(NoopEmitter::new());
    let ctx = Arc::new(SessionContext {
        connector: Arc::new(connector),
        validator,
        emitter: emitter.clone(),
        client_info: InspectorSettings::with_defaults().client_info(),
        roots: Vec::new(),
        sampling: Arc::new(SamplingQueue::new(emitter.clone())),
        notifications: Arc::new(NotificationLog::new(emitter)),
        history: Arc::new(RequestHistory::new(0)),
    });

    let recorder = Arc::new(Recorder::default());
    let observer: Weak<Recorder> = Arc::downgrade(&recorder);
    let observer: Weak<dyn StatusObserver> = observer;
    let spec = ServerSpec::new("a", TransportConfig::stdio("everything", vec![]));

    Fixture {
        server,
        recorder,
        connection: Connection::new(spec, ctx, observer),
    }
}

/// Yield until `condition` holds, failing the test after five seconds.
pub(crate) async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
