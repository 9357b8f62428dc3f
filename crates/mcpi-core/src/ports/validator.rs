//! Response shape validation contract.

use serde_json::Value;
use thiserror::Error;

use crate::domain::{ResponseShape, TypedResponse};

/// A response did not match the shape its request expected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("expected {shape:?}: {message}")]
pub struct ShapeError {
    pub shape: ResponseShape,
    pub message: String,
}

impl ShapeError {
    pub fn new(shape: ResponseShape, message: impl Into<String>) -> Self {
        Self {
            shape,
            message: message.into(),
        }
    }
}

/// Validates raw responses against the shape expected per request kind.
#[cfg_attr(test, mockall::automock)]
pub trait ShapeValidator: Send + Sync {
    fn validate(&self, raw: &Value, shape: ResponseShape) -> Result<TypedResponse, ShapeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_validator_is_object_safe() {
        let mut mock = MockShapeValidator::new();
        mock.expect_validate()
            .with(eq(json!({})), eq(ResponseShape::Empty))
            .times(1)
            .returning(|_, _| Ok(TypedResponse::Empty));

        let validator: Arc<dyn ShapeValidator> = Arc::new(mock);
        assert_eq!(
            validator.validate(&json!({}), ResponseShape::Empty),
            Ok(TypedResponse::Empty)
        );
    }

    #[test]
    fn test_shape_error_display() {
        let err = ShapeError::new(ResponseShape::ListTools, "missing field `tools`");
        assert_eq!(err.to_string(), "expected ListTools: missing field `tools`");
    }
}
