use serde_json::Value;

use super::{Issue, Schema};
use crate::error::Error;
use crate::handler::BoxFuture;

/// A JSON Schema document used as a request or response schema.
///
/// The document is compiled once, at construction, with `format` assertions
/// enabled (`uuid`, `email`, `date-time`, ...). Validation never alters the
/// value; reflection returns the document as written.
///
/// ```rust
/// use covenant::JsonSchema;
/// use serde_json::json;
///
/// let user = JsonSchema::new(json!({
///     "type": "object",
///     "properties": { "name": { "type": "string" } },
///     "required": ["name"],
/// }))?;
/// # Ok::<(), covenant::Error>(())
/// ```
pub struct JsonSchema {
    document: Value,
    validator: jsonschema::Validator,
}

impl JsonSchema {
    pub fn new(document: Value) -> Result<Self, Error> {
        let validator = jsonschema::options()
            .should_validate_formats(true)
            .build(&document)
            .map_err(|e| Error::Schema(e.to_string()))?;
        Ok(Self { document, validator })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }
}

impl Schema for JsonSchema {
    fn validate(&self, input: Value) -> BoxFuture<'_, Result<Value, Vec<Issue>>> {
        let issues: Vec<Issue> = self.validator
            .iter_errors(&input)
            .map(|e| Issue::new(pointer_segments(&e.instance_path.to_string()), e.to_string()))
            .collect();
        Box::pin(async move {
            if issues.is_empty() { Ok(input) } else { Err(issues) }
        })
    }

    fn reflect(&self) -> Option<Value> {
        Some(self.document.clone())
    }
}

/// Splits a JSON pointer (`/user/tags/0`) into unescaped segments.
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

impl std::fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("JsonSchema").field(&self.document).finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::validate;

    fn user() -> JsonSchema {
        JsonSchema::new(json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "integer", "minimum": 0 },
            },
            "required": ["name"],
        }))
        .unwrap()
    }

    #[test]
    fn pointer_unescaping() {
        assert_eq!(pointer_segments(""), Vec::<String>::new());
        assert_eq!(pointer_segments("/a~1b/0/c~0d"), vec!["a/b", "0", "c~d"]);
    }

    #[test]
    fn uncompilable_document_is_rejected() {
        let err = JsonSchema::new(json!({ "type": 12 })).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[tokio::test]
    async fn valid_input_is_returned_unchanged() {
        let value = json!({ "name": "alice", "age": 30 });
        assert_eq!(user().validate(value.clone()).await, Ok(value));
    }

    #[tokio::test]
    async fn nested_failures_carry_their_path() {
        let err = validate(Some(&user()), json!({ "name": "bob", "age": -1 })).await.unwrap_err();
        assert!(err.message().starts_with("age: "), "{}", err.message());
    }

    #[tokio::test]
    async fn formats_are_asserted() {
        let id = JsonSchema::new(json!({ "type": "string", "format": "uuid" })).unwrap();

        assert!(id.validate(json!("not-a-uuid")).await.is_err());
        assert!(id.validate(json!("550e8400-e29b-41d4-a716-446655440000")).await.is_ok());
    }

    #[test]
    fn reflects_its_document() {
        assert_eq!(user().reflect().unwrap()["required"], json!(["name"]));
    }
}
