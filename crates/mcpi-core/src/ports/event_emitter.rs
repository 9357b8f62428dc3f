//! Event emitter trait for broadcasting inspector events.
//!
//! Implementations handle transport details (channels, SSE, UI bridges).

use tokio::sync::broadcast;
use tracing::trace;

use crate::events::InspectorEvent;

/// Trait for emitting inspector events.
///
/// Keeps channel types out of the public API surface.
///
/// # Implementations
///
/// - `NoopEmitter` - For tests and headless contexts
/// - `ChannelEmitter` - Broadcast channel fan-out to any number of subscribers
pub trait InspectorEventEmitter: Send + Sync {
    /// Emit an event. Must not block.
    fn emit(&self, event: InspectorEvent);
}

/// A no-op event emitter.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl InspectorEventEmitter for NoopEmitter {
    fn emit(&self, _event: InspectorEvent) {
        // Intentionally do nothing
    }
}

/// Broadcast channel capacity for inspector events
const CHANNEL_CAPACITY: usize = 256;

/// Emitter that fans events out over a tokio broadcast channel.
///
/// Slow subscribers lag rather than block emitters.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: broadcast::Sender<InspectorEvent>,
}

impl ChannelEmitter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to all subsequently emitted events.
    pub fn subscribe(&self) -> broadcast::Receiver<InspectorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChannelEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectorEventEmitter for ChannelEmitter {
    fn emit(&self, event: InspectorEvent) {
        // No subscribers is not an error
        if self.sender.receiver_count() > 0 {
            trace!(event = event.event_name(), "Broadcasting inspector event");
            let _ = self.sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LinkStatus;
    use std::sync::Arc;

    #[test]
    fn test_noop_emitter() {
        let emitter = NoopEmitter::new();

        // Should not panic
        emitter.emit(InspectorEvent::link_status_changed(LinkStatus::Open));
    }

    #[tokio::test]
    async fn test_channel_emitter_delivers_to_subscribers() {
        let emitter = ChannelEmitter::new();
        let mut rx = emitter.subscribe();

        let shared: Arc<dyn InspectorEventEmitter> = Arc::new(emitter.clone());
        shared.emit(InspectorEvent::link_status_changed(LinkStatus::Closed));

        let event = rx.recv().await.unwrap();
        assert_eq!(event, InspectorEvent::link_status_changed(LinkStatus::Closed));
    }

    #[test]
    fn test_channel_emitter_without_subscribers() {
        let emitter = ChannelEmitter::new();
        assert_eq!(emitter.subscriber_count(), 0);
        emitter.emit(InspectorEvent::link_status_changed(LinkStatus::Open));
    }
}
