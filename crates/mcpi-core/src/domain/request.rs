//! Request envelopes, error-isolation categories and typed responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

use super::capabilities::CapabilitySet;
use super::protocol::{
    CallToolResult, CompleteResult, GetPromptResult, InitializeResult, ListPage, PromptDescriptor,
    ReadResourceResult, ResourceDescriptor, ResourceTemplate, ToolDescriptor,
};

/// Functional grouping used to scope error display.
///
/// `None` bypasses category error state entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Resources,
    Prompts,
    Tools,
    None,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resources => "resources",
            Self::Prompts => "prompts",
            Self::Tools => "tools",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// Paginated listing kinds, each with its own cursor store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListCategory {
    Resources,
    ResourceTemplates,
    Prompts,
    Tools,
}

impl ListCategory {
    pub const ALL: [Self; 4] = [
        Self::Resources,
        Self::ResourceTemplates,
        Self::Prompts,
        Self::Tools,
    ];

    /// Protocol method that returns one page of this listing.
    pub const fn method(self) -> &'static str {
        match self {
            Self::Resources => "resources/list",
            Self::ResourceTemplates => "resources/templates/list",
            Self::Prompts => "prompts/list",
            Self::Tools => "tools/list",
        }
    }

    pub const fn shape(self) -> ResponseShape {
        match self {
            Self::Resources => ResponseShape::ListResources,
            Self::ResourceTemplates => ResponseShape::ListResourceTemplates,
            Self::Prompts => ResponseShape::ListPrompts,
            Self::Tools => ResponseShape::ListTools,
        }
    }

    /// Error category failures of this listing are recorded under.
    pub const fn category(self) -> Category {
        match self {
            Self::Resources | Self::ResourceTemplates => Category::Resources,
            Self::Prompts => Category::Prompts,
            Self::Tools => Category::Tools,
        }
    }

    /// Capability a server must advertise for this listing.
    pub const fn capability(self) -> CapabilitySet {
        match self {
            Self::Resources | Self::ResourceTemplates => CapabilitySet::RESOURCES,
            Self::Prompts => CapabilitySet::PROMPTS,
            Self::Tools => CapabilitySet::TOOLS,
        }
    }
}

/// Expected shape of a response, checked by the `ShapeValidator` port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    Initialize,
    ListResources,
    ListResourceTemplates,
    ListPrompts,
    ListTools,
    ReadResource,
    GetPrompt,
    CallTool,
    Complete,
    /// Any object, contents ignored (`ping`, `logging/setLevel`, subscriptions)
    Empty,
    /// Any JSON value, passed through untouched
    Any,
}

/// Token attached to a long-running call so the server can report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressToken(pub u64);

impl fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One outstanding protocol call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub expected_shape: ResponseShape,
    pub category: Category,
}

impl RequestEnvelope {
    pub fn new(
        method: impl Into<String>,
        expected_shape: ResponseShape,
        category: Category,
    ) -> Self {
        Self {
            method: method.into(),
            params: None,
            expected_shape,
            category,
        }
    }

    /// Envelope for one page of a listing, resuming at `cursor` when given.
    pub fn list(category: ListCategory, cursor: Option<&str>) -> Self {
        let envelope = Self::new(category.method(), category.shape(), category.category());
        match cursor {
            Some(cursor) => envelope.with_cursor(cursor),
            None => envelope,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn with_cursor(self, cursor: &str) -> Self {
        self.with_param("cursor", json!(cursor))
    }

    /// Attach a progress token under `_meta.progressToken`.
    #[must_use]
    pub fn with_progress_token(mut self, token: ProgressToken) -> Self {
        let mut meta = match self.params.as_mut().and_then(|p| p.get_mut("_meta")) {
            Some(Value::Object(meta)) => std::mem::take(meta),
            _ => Map::new(),
        };
        meta.insert("progressToken".to_string(), json!(token.0));
        self.with_param("_meta", Value::Object(meta))
    }

    fn with_param(mut self, key: &str, value: Value) -> Self {
        let mut map = match self.params.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert(key.to_string(), value);
        self.params = Some(Value::Object(map));
        self
    }

    pub fn cursor(&self) -> Option<&str> {
        self.params.as_ref()?.get("cursor")?.as_str()
    }

    pub fn progress_token(&self) -> Option<ProgressToken> {
        self.params
            .as_ref()?
            .get("_meta")?
            .get("progressToken")?
            .as_u64()
            .map(ProgressToken)
    }
}

/// One item of any paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    Resource(ResourceDescriptor),
    ResourceTemplate(ResourceTemplate),
    Prompt(PromptDescriptor),
    Tool(ToolDescriptor),
}

impl ListItem {
    pub const fn as_tool(&self) -> Option<&ToolDescriptor> {
        match self {
            Self::Tool(tool) => Some(tool),
            _ => None,
        }
    }

    /// Display name of the item (URI template for templates).
    pub fn name(&self) -> &str {
        match self {
            Self::Resource(r) => &r.name,
            Self::ResourceTemplate(t) => &t.name,
            Self::Prompt(p) => &p.name,
            Self::Tool(t) => &t.name,
        }
    }
}

/// A validated response, typed by the shape it was checked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum TypedResponse {
    Empty,
    Initialize(InitializeResult),
    Resources(ListPage<ResourceDescriptor>),
    ResourceTemplates(ListPage<ResourceTemplate>),
    Prompts(ListPage<PromptDescriptor>),
    Tools(ListPage<ToolDescriptor>),
    ReadResource(ReadResourceResult),
    GetPrompt(GetPromptResult),
    CallTool(CallToolResult),
    Complete(CompleteResult),
    Raw(Value),
}

impl TypedResponse {
    /// Whether this is the variant a request expecting `shape` should get.
    ///
    /// `Any` accepts every variant.
    pub const fn matches(&self, shape: ResponseShape) -> bool {
        matches!(
            (shape, self),
            (ResponseShape::Any, _)
                | (ResponseShape::Empty, Self::Empty)
                | (ResponseShape::Initialize, Self::Initialize(_))
                | (ResponseShape::ListResources, Self::Resources(_))
                | (ResponseShape::ListResourceTemplates, Self::ResourceTemplates(_))
                | (ResponseShape::ListPrompts, Self::Prompts(_))
                | (ResponseShape::ListTools, Self::Tools(_))
                | (ResponseShape::ReadResource, Self::ReadResource(_))
                | (ResponseShape::GetPrompt, Self::GetPrompt(_))
                | (ResponseShape::CallTool, Self::CallTool(_))
                | (ResponseShape::Complete, Self::Complete(_))
        )
    }

    /// Flatten any list variant into a page of `ListItem`s.
    pub fn into_list_page(self) -> Option<ListPage<ListItem>> {
        fn convert<T>(page: ListPage<T>, wrap: fn(T) -> ListItem) -> ListPage<ListItem> {
            ListPage {
                items: page.items.into_iter().map(wrap).collect(),
                next_cursor: page.next_cursor,
            }
        }

        match self {
            Self::Resources(page) => Some(convert(page, ListItem::Resource)),
            Self::ResourceTemplates(page) => Some(convert(page, ListItem::ResourceTemplate)),
            Self::Prompts(page) => Some(convert(page, ListItem::Prompt)),
            Self::Tools(page) => Some(convert(page, ListItem::Tool)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_matches_its_shape() {
        let tools = TypedResponse::Tools(ListPage {
            items: Vec::new(),
            next_cursor: None,
        });
        assert!(tools.matches(ResponseShape::ListTools));
        assert!(tools.matches(ResponseShape::Any));
        assert!(!tools.matches(ResponseShape::ListPrompts));

        let raw = TypedResponse::Raw(json!({"tools": []}));
        assert!(raw.matches(ResponseShape::Any));
        assert!(!raw.matches(ResponseShape::ListTools));
        assert!(!raw.matches(ResponseShape::Empty));
    }

    #[test]
    fn test_list_envelope_without_cursor_has_no_params() {
        let envelope = RequestEnvelope::list(ListCategory::Tools, None);
        assert_eq!(envelope.method, "tools/list");
        assert_eq!(envelope.category, Category::Tools);
        assert!(envelope.params.is_none());
        assert!(envelope.cursor().is_none());
    }

    #[test]
    fn test_list_envelope_carries_cursor() {
        let envelope = RequestEnvelope::list(ListCategory::ResourceTemplates, Some("c1"));
        assert_eq!(envelope.method, "resources/templates/list");
        assert_eq!(envelope.category, Category::Resources);
        assert_eq!(envelope.cursor(), Some("c1"));
    }

    #[test]
    fn test_progress_token_merges_into_existing_params() {
        let envelope = RequestEnvelope::new("tools/call", ResponseShape::CallTool, Category::Tools)
            .with_params(json!({"name": "echo", "arguments": {"message": "hi"}}))
            .with_progress_token(ProgressToken(7));

        let params = envelope.params.as_ref().unwrap();
        assert_eq!(params["name"], "echo");
        assert_eq!(params["_meta"]["progressToken"], 7);
        assert_eq!(envelope.progress_token(), Some(ProgressToken(7)));
    }

    #[test]
    fn test_into_list_page_flattens_tools() {
        let response = TypedResponse::Tools(ListPage {
            items: vec![ToolDescriptor::new("t1"), ToolDescriptor::new("t2")],
            next_cursor: Some("c1".into()),
        });
        let page = response.into_list_page().unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].as_tool().unwrap().name, "t1");
        assert_eq!(page.next_cursor.as_deref(), Some("c1"));
    }

    #[test]
    fn test_non_list_response_has_no_page() {
        assert!(TypedResponse::Empty.into_list_page().is_none());
    }
}
