//! Port definitions: the seams between the orchestration layer and the
//! collaborators it consumes (transports, response validation, event sinks).

mod event_emitter;
mod transport;
mod validator;

pub use event_emitter::{ChannelEmitter, InspectorEventEmitter, NoopEmitter};
pub use transport::{
    InboundMessage, OpenedSession, OutboundRequest, ResponseSender, ServerRequest,
    TransportConnector, TransportSession,
};
pub use validator::{ShapeError, ShapeValidator};
