//! Default response validation, backed by serde.

use mcpi_core::{ListPage, ResponseShape, ShapeError, ShapeValidator, TypedResponse};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Validates responses by deserializing them into the typed protocol shapes.
///
/// List results are read from their item key (`tools`, `resources`,
/// `resourceTemplates`, `prompts`) plus an optional `nextCursor`. An empty
/// cursor string means there are no further pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeShapeValidator;

impl SerdeShapeValidator {
    pub const fn new() -> Self {
        Self
    }
}

impl ShapeValidator for SerdeShapeValidator {
    fn validate(&self, raw: &Value, shape: ResponseShape) -> Result<TypedResponse, ShapeError> {
        match shape {
            ResponseShape::Initialize => parse(raw, shape).map(TypedResponse::Initialize),
            ResponseShape::ListResources => {
                page(raw, shape, "resources").map(TypedResponse::Resources)
            }
            ResponseShape::ListResourceTemplates => {
                page(raw, shape, "resourceTemplates").map(TypedResponse::ResourceTemplates)
            }
            ResponseShape::ListPrompts => page(raw, shape, "prompts").map(TypedResponse::Prompts),
            ResponseShape::ListTools => page(raw, shape, "tools").map(TypedResponse::Tools),
            ResponseShape::ReadResource => parse(raw, shape).map(TypedResponse::ReadResource),
            ResponseShape::GetPrompt => parse(raw, shape).map(TypedResponse::GetPrompt),
            ResponseShape::CallTool => parse(raw, shape).map(TypedResponse::CallTool),
            ResponseShape::Complete => parse(raw, shape).map(TypedResponse::Complete),
            ResponseShape::Empty => {
                if raw.is_object() {
                    Ok(TypedResponse::Empty)
                } else {
                    Err(ShapeError::new(shape, "expected an object"))
                }
            }
            ResponseShape::Any => Ok(TypedResponse::Raw(raw.clone())),
        }
    }
}

fn parse<T: DeserializeOwned>(raw: &Value, shape: ResponseShape) -> Result<T, ShapeError> {
    T::deserialize(raw).map_err(|e| ShapeError::new(shape, e.to_string()))
}

fn page<T: DeserializeOwned>(
    raw: &Value,
    shape: ResponseShape,
    key: &str,
) -> Result<ListPage<T>, ShapeError> {
    let object = raw
        .as_object()
        .ok_or_else(|| ShapeError::new(shape, "expected an object"))?;

    let items = object
        .get(key)
        .ok_or_else(|| ShapeError::new(shape, format!("missing field `{key}`")))?;
    let items = Vec::<T>::deserialize(items).map_err(|e| ShapeError::new(shape, e.to_string()))?;

    let next_cursor = match object.get("nextCursor") {
        None | Some(Value::Null) => None,
        Some(Value::String(cursor)) if cursor.is_empty() => None,
        Some(Value::String(cursor)) => Some(cursor.clone()),
        Some(_) => return Err(ShapeError::new(shape, "`nextCursor` must be a string")),
    };

    Ok(ListPage { items, next_cursor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tools_page_with_cursor() {
        let raw = json!({
            "tools": [{"name": "echo", "inputSchema": {"type": "object"}}],
            "nextCursor": "c1"
        });
        let response = SerdeShapeValidator
            .validate(&raw, ResponseShape::ListTools)
            .unwrap();
        let TypedResponse::Tools(page) = response else {
            panic!("expected tools page");
        };
        assert_eq!(page.items[0].name, "echo");
        assert_eq!(page.next_cursor.as_deref(), Some("c1"));
    }

    #[test]
    fn test_empty_cursor_ends_listing() {
        let raw = json!({"prompts": [], "nextCursor": ""});
        let response = SerdeShapeValidator
            .validate(&raw, ResponseShape::ListPrompts)
            .unwrap();
        let page = response.into_list_page().unwrap();
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_missing_item_key_is_rejected() {
        let err = SerdeShapeValidator
            .validate(&json!({"items": []}), ResponseShape::ListResources)
            .unwrap_err();
        assert_eq!(err.shape, ResponseShape::ListResources);
        assert!(err.message.contains("resources"));
    }

    #[test]
    fn test_call_tool_result() {
        let raw = json!({"content": [{"type": "text", "text": "boom"}], "isError": true});
        let response = SerdeShapeValidator
            .validate(&raw, ResponseShape::CallTool)
            .unwrap();
        let TypedResponse::CallTool(result) = response else {
            panic!("expected tool result");
        };
        assert!(result.is_error);
        assert_eq!(result.first_text(), Some("boom"));
    }

    #[test]
    fn test_empty_and_any_shapes() {
        assert_eq!(
            SerdeShapeValidator.validate(&json!({}), ResponseShape::Empty),
            Ok(TypedResponse::Empty)
        );
        assert!(SerdeShapeValidator
            .validate(&json!("pong"), ResponseShape::Empty)
            .is_err());
        assert_eq!(
            SerdeShapeValidator.validate(&json!([1, 2]), ResponseShape::Any),
            Ok(TypedResponse::Raw(json!([1, 2])))
        );
    }
}
