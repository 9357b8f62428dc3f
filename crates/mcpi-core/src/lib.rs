//! Core domain types and port definitions for the mcpi inspector.
//!
//! This crate holds everything the orchestration layer and its adapters
//! agree on: server and transport configuration, protocol payload shapes,
//! request envelopes, the canonical event union, and the port traits for
//! transports, response validation and event emission. It contains no
//! adapter code.
#![deny(unused_crate_dependencies)]

pub mod config_file;
pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use config_file::{ConfigFileError, ServerEntry, ServersFile};
pub use domain::{
    CallToolResult, CapabilitySet, Category, ClientInfo, CompleteResult, Completion,
    GetPromptResult, Implementation, InitializeResult, LinkStatus, ListCategory, ListItem,
    ListPage, LoggingLevel, NotificationRecord, NotificationSource, PendingSamplingView,
    ProgressToken, PromptArgument, PromptDescriptor, ReadResourceResult, RequestEnvelope,
    ResourceDescriptor, ResourceTemplate, ResponseShape, Root, ServerCapabilities, ServerId,
    ServerSpec, ServerStatus, ToolDescriptor, TransportConfig, TransportKind, TypedResponse,
};
pub use error::{ErrorCategory, ErrorInfo, InspectorError, RpcError, TransportError};
pub use events::{InspectorEvent, StatusChange};
pub use ports::{
    ChannelEmitter, InboundMessage, InspectorEventEmitter, NoopEmitter, OpenedSession,
    OutboundRequest, ResponseSender, ServerRequest, ShapeError, ShapeValidator,
    TransportConnector, TransportSession,
};
pub use settings::{
    AutoActivatePolicy, DEFAULT_CLIENT_NAME, DEFAULT_PROTOCOL_VERSION, InspectorSettings,
    SettingsError, validate_settings,
};
