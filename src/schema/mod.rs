//! The schema capability and the uniform validation entry point.
//!
//! covenant has no schema language of its own. Anything that can check a
//! JSON value and, optionally, describe itself as JSON Schema can guard a
//! route: implement [`Schema`]. Two adapters ship with the crate:
//!
//! - [`JsonSchema`]: JSON Schema documents, checked by the `jsonschema` crate.
//! - [`Typed`]: any serde type; coercion and defaults come from serde.

mod contract;
mod json;
mod merge;
mod typed;

use std::sync::Arc;

use serde_json::Value;

use crate::error::PipelineError;
use crate::handler::BoxFuture;

pub use contract::{Field, RequestSchema, ResponseSchema};
pub use json::JsonSchema;
pub use merge::{merge_request, merge_response};
pub use typed::Typed;

/// One problem found while validating a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Location of the offending value, outermost segment first.
    pub path: Vec<String>,
    pub message: String,
}

impl Issue {
    pub fn new(path: Vec<String>, message: impl Into<String>) -> Self {
        Self { path, message: message.into() }
    }

    /// An issue about the value as a whole.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new(Vec::new(), message)
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path.join("."), self.message)
        }
    }
}

/// A validator the pipeline can consult.
///
/// `validate` returns the schema's *output*, which may differ from its input
/// when the schema coerces or fills defaults. Returning `Err` with an empty
/// issue list is allowed; it is reported as a generic rejection.
pub trait Schema: Send + Sync + 'static {
    fn validate(&self, input: Value) -> BoxFuture<'_, Result<Value, Vec<Issue>>>;

    /// A JSON Schema description of the accepted shape, used for API
    /// documentation. `None` when the schema cannot describe itself.
    fn reflect(&self) -> Option<Value> {
        None
    }
}

/// A schema shared between contracts, routes and the API document generator.
pub type SharedSchema = Arc<dyn Schema>;

/// Runs `data` through `schema`.
///
/// No schema means no validation: `data` comes back untouched. Rejections
/// become a [`ErrorKind::Validation`](crate::ErrorKind::Validation) error
/// whose message lists every issue as `path: message`, comma-separated.
pub async fn validate(schema: Option<&dyn Schema>, data: Value) -> Result<Value, PipelineError> {
    let Some(schema) = schema else {
        return Ok(data);
    };
    schema.validate(data).await.map_err(|issues| PipelineError::validation(describe(&issues)))
}

fn describe(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "value rejected by schema".to_owned();
    }
    issues.iter().map(Issue::to_string).collect::<Vec<_>>().join(", ")
}
