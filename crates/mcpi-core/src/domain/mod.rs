//! Domain types shared by the orchestration layer and its adapters.

mod capabilities;
mod notification;
mod protocol;
mod request;
mod sampling;
mod server;

pub use capabilities::CapabilitySet;
pub use notification::{NotificationRecord, NotificationSource};
pub use protocol::{
    CallToolResult, ClientInfo, CompleteResult, Completion, GetPromptResult, Implementation,
    InitializeResult, ListPage, LoggingLevel, PromptArgument, PromptDescriptor,
    ReadResourceResult, ResourceDescriptor, ResourceTemplate, Root, ServerCapabilities,
    ToolDescriptor,
};
pub use request::{
    Category, ListCategory, ListItem, ProgressToken, RequestEnvelope, ResponseShape,
    TypedResponse,
};
pub use sampling::PendingSamplingView;
pub use server::{LinkStatus, ServerId, ServerSpec, ServerStatus, TransportConfig, TransportKind};
