//! Shared helpers for mcpi-session integration tests.

#![allow(dead_code)]

use mcpi_core::{
    AutoActivatePolicy, ChannelEmitter, InspectorEvent, InspectorSettings, LinkStatus, ServerId,
    ServerSpec, TransportConfig,
};
use mcpi_session::ConnectionManager;
use mcpi_session::loopback::{LoopbackConnector, LoopbackServer};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Route test logs through the libtest writer. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub manager: ConnectionManager,
    pub servers: BTreeMap<String, Arc<LoopbackServer>>,
    pub events: broadcast::Receiver<InspectorEvent>,
}

impl Harness {
    pub fn server(&self, name: &str) -> &Arc<LoopbackServer> {
        &self.servers[name]
    }

    /// Drain every event emitted so far.
    pub fn drain_events(&mut self) -> Vec<InspectorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn id(name: &str) -> ServerId {
    ServerId::new(name)
}

/// A manager with one loopback stdio server per name and the link open.
pub fn harness(names: &[&str]) -> Harness {
    harness_with_policy(names, AutoActivatePolicy::OnRunning)
}

pub fn harness_with_policy(names: &[&str], policy: AutoActivatePolicy) -> Harness {
    init_tracing();

    let connector = Arc::new(LoopbackConnector::new());
    let mut servers = BTreeMap::new();
    let mut specs = Vec::new();
    for name in names {
        let server = Arc::new(LoopbackServer::new(name));
        connector.register(name, Arc::clone(&server));
        servers.insert((*name).to_string(), server);
        specs.push(
            ServerSpec::new(*name, TransportConfig::stdio(*name, vec![]))
                .with_label(format!("{name} server")),
        );
    }

    let emitter = ChannelEmitter::new();
    let events = emitter.subscribe();
    let settings = InspectorSettings {
        auto_activate: Some(policy),
        ..InspectorSettings::with_defaults()
    };

    let manager = ConnectionManager::builder(connector)
        .settings(settings)
        .emitter(Arc::new(emitter))
        .servers(specs)
        .build()
        .expect("harness manager should build");
    manager.set_link_status(LinkStatus::Open);

    Harness {
        manager,
        servers,
        events,
    }
}

/// Yield until `condition` holds, failing the test after five seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
