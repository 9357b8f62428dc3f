//! Typed protocol operations on top of [`ConnectionManager::dispatch`].
//!
//! Single-value reads overwrite the connection's content slot for their
//! kind. A missing capability is only logged: the request is still sent
//! and the server's answer decides.

use mcpi_core::{
    CallToolResult, CapabilitySet, Category, CompleteResult, GetPromptResult, InspectorError,
    LoggingLevel, ReadResourceResult, RequestEnvelope, ResponseShape, ServerId, TypedResponse,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::debug;

use crate::connection::Connection;
use crate::manager::ConnectionManager;

fn unexpected(method: &str, response: TypedResponse) -> InspectorError {
    InspectorError::InvalidResponseShape {
        method: method.to_string(),
        message: "validator returned a different shape".to_string(),
        raw: serde_json::to_value(response).unwrap_or(Value::Null),
    }
}

fn advise(connection: &Connection, capability: CapabilitySet, method: &str) {
    if !connection.capabilities().contains(capability) {
        debug!(
            server_id = %connection.id(),
            method,
            capability = ?capability.names(),
            "Server did not advertise capability, sending anyway"
        );
    }
}

impl ConnectionManager {
    /// Send `ping` and wait for the empty reply.
    pub async fn ping(&self, id: &ServerId) -> Result<(), InspectorError> {
        let envelope = RequestEnvelope::new("ping", ResponseShape::Empty, Category::None);
        self.dispatch(id, envelope).await.map(|_| ())
    }

    /// Read one resource and keep it as the connection's current resource.
    pub async fn read_resource(
        &self,
        id: &ServerId,
        uri: &str,
    ) -> Result<ReadResourceResult, InspectorError> {
        const METHOD: &str = "resources/read";
        self.ensure_link_open()?;
        let connection = self.connection(id)?;
        advise(&connection, CapabilitySet::RESOURCES, METHOD);

        let envelope =
            RequestEnvelope::new(METHOD, ResponseShape::ReadResource, Category::Resources)
                .with_params(json!({ "uri": uri }));
        match connection.dispatch_tracked(envelope).await? {
            (TypedResponse::ReadResource(result), generation) => {
                connection.update_if_current(generation, |state| {
                    state.content.resource = Some((uri.to_string(), result.clone()));
                });
                Ok(result)
            }
            (other, _) => Err(unexpected(METHOD, other)),
        }
    }

    pub async fn subscribe_resource(&self, id: &ServerId, uri: &str) -> Result<(), InspectorError> {
        self.resource_subscription(id, "resources/subscribe", uri).await
    }

    pub async fn unsubscribe_resource(
        &self,
        id: &ServerId,
        uri: &str,
    ) -> Result<(), InspectorError> {
        self.resource_subscription(id, "resources/unsubscribe", uri).await
    }

    async fn resource_subscription(
        &self,
        id: &ServerId,
        method: &str,
        uri: &str,
    ) -> Result<(), InspectorError> {
        self.ensure_link_open()?;
        let connection = self.connection(id)?;
        advise(&connection, CapabilitySet::SUBSCRIBE, method);

        let envelope = RequestEnvelope::new(method, ResponseShape::Empty, Category::Resources)
            .with_params(json!({ "uri": uri }));
        connection.dispatch(envelope).await.map(|_| ())
    }

    /// Render a prompt and keep it as the connection's current prompt.
    pub async fn get_prompt(
        &self,
        id: &ServerId,
        name: &str,
        arguments: BTreeMap<String, String>,
    ) -> Result<GetPromptResult, InspectorError> {
        const METHOD: &str = "prompts/get";
        self.ensure_link_open()?;
        let connection = self.connection(id)?;
        advise(&connection, CapabilitySet::PROMPTS, METHOD);

        let envelope = RequestEnvelope::new(METHOD, ResponseShape::GetPrompt, Category::Prompts)
            .with_params(json!({ "name": name, "arguments": arguments }));
        match connection.dispatch_tracked(envelope).await? {
            (TypedResponse::GetPrompt(result), generation) => {
                connection.update_if_current(generation, |state| {
                    state.content.prompt = Some((name.to_string(), result.clone()));
                });
                Ok(result)
            }
            (other, _) => Err(unexpected(METHOD, other)),
        }
    }

    /// Call a tool. A fresh progress token is attached automatically.
    ///
    /// A result with `isError` set is still a successful call.
    pub async fn call_tool(
        &self,
        id: &ServerId,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, InspectorError> {
        const METHOD: &str = "tools/call";
        self.ensure_link_open()?;
        let connection = self.connection(id)?;
        advise(&connection, CapabilitySet::TOOLS, METHOD);

        let envelope = RequestEnvelope::new(METHOD, ResponseShape::CallTool, Category::Tools)
            .with_params(json!({ "name": name, "arguments": arguments }));
        match connection.dispatch_tracked(envelope).await? {
            (TypedResponse::CallTool(result), generation) => {
                if result.is_error {
                    debug!(server_id = %id, tool = name, error = ?result.first_text(), "Tool reported an error");
                }
                connection.update_if_current(generation, |state| {
                    state.content.tool_result = Some((name.to_string(), result.clone()));
                });
                Ok(result)
            }
            (other, _) => Err(unexpected(METHOD, other)),
        }
    }

    pub async fn set_logging_level(
        &self,
        id: &ServerId,
        level: LoggingLevel,
    ) -> Result<(), InspectorError> {
        const METHOD: &str = "logging/setLevel";
        self.ensure_link_open()?;
        let connection = self.connection(id)?;
        advise(&connection, CapabilitySet::LOGGING, METHOD);

        let envelope = RequestEnvelope::new(METHOD, ResponseShape::Empty, Category::None)
            .with_params(json!({ "level": level }));
        connection.dispatch(envelope).await.map(|_| ())
    }

    /// Ask for argument completions.
    ///
    /// `reference` is the prompt or resource-template reference object,
    /// e.g. `{"type": "ref/prompt", "name": "greet"}`.
    pub async fn complete(
        &self,
        id: &ServerId,
        reference: Value,
        argument: &str,
        value: &str,
    ) -> Result<CompleteResult, InspectorError> {
        const METHOD: &str = "completion/complete";
        self.ensure_link_open()?;
        let connection = self.connection(id)?;
        advise(&connection, CapabilitySet::COMPLETIONS, METHOD);

        let envelope = RequestEnvelope::new(METHOD, ResponseShape::Complete, Category::None)
            .with_params(json!({
                "ref": reference,
                "argument": { "name": argument, "value": value },
            }));
        match connection.dispatch(envelope).await? {
            TypedResponse::Complete(result) => Ok(result),
            other => Err(unexpected(METHOD, other)),
        }
    }
}
