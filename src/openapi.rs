//! API document generation.
//!
//! The document is derived from the same declarations the pipeline enforces:
//! every resolved route contributes one operation, its parameters come from
//! reflecting the effective params/query/headers/cookies schemas, its body
//! from the body schema, and its responses from the response contract.
//!
//! Schemas that cannot describe themselves ([`Schema::reflect`] returns
//! `None`) contribute no parameters and an empty (`{}`) schema elsewhere.
//!
//! [`Schema::reflect`]: crate::Schema::reflect

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::router::InternalRoute;
use crate::schema::{Field, SharedSchema};

pub const OPENAPI_VERSION: &str = "3.1.0";

/// Document root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApi {
    pub openapi: String,
    pub info: Info,
    /// Path template → lowercase method → operation.
    pub paths: IndexMap<String, IndexMap<String, Operation>>,
}

/// API metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: String,
}

impl Info {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self { title: title.into(), description: None, version: version.into() }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Default for Info {
    fn default() -> Self {
        Self::new("API", "1.0.0")
    }
}

/// One method on one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "operationId", default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Status code (as a string) → response.
    pub responses: IndexMap<String, ResponseDoc>,
}

/// Parameter location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterIn {
    Path,
    Query,
    Header,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterIn,
    pub required: bool,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDoc {
    pub description: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

/// Builds the document for `routes`, in registration order.
pub fn generate(info: &Info, routes: &[Arc<InternalRoute>]) -> OpenApi {
    let mut paths: IndexMap<String, IndexMap<String, Operation>> = IndexMap::new();
    for route in routes {
        paths
            .entry(route.template())
            .or_default()
            .insert(route.method().operation_key().to_owned(), operation(route));
    }
    OpenApi { openapi: OPENAPI_VERSION.to_owned(), info: info.clone(), paths }
}

fn operation(route: &InternalRoute) -> Operation {
    let request = route.request_schema();
    let doc = route.doc();

    let parameters = [
        (Field::Params, ParameterIn::Path),
        (Field::Query, ParameterIn::Query),
        (Field::Headers, ParameterIn::Header),
        (Field::Cookies, ParameterIn::Cookie),
    ]
    .into_iter()
    .filter_map(|(field, location)| request.get(field).map(|schema| (schema, location)))
    .flat_map(|(schema, location)| reflect_parameters(schema, location))
    .collect();

    let request_body = request.get(Field::Body).map(|schema| RequestBody {
        required: true,
        content: json_content(schema),
    });

    let responses = route.response_schema().iter()
        .map(|(status, schema)| {
            let description = http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or_default()
                .to_owned();
            (status.to_string(), ResponseDoc { description, content: json_content(schema) })
        })
        .collect();

    Operation {
        operation_id: doc.operation_id.clone(),
        summary: doc.summary.clone(),
        description: doc.description.clone(),
        tags: doc.tags.clone(),
        parameters,
        request_body,
        responses,
    }
}

/// One parameter per reflected property. Path parameters are always
/// required; the rest follow the schema's `required` list.
fn reflect_parameters(schema: &SharedSchema, location: ParameterIn) -> Vec<Parameter> {
    let Some(reflected) = schema.reflect() else {
        return Vec::new();
    };
    let required: Vec<&str> = reflected.get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    reflected.get("properties")
        .and_then(Value::as_object)
        .map(|properties| {
            properties.iter()
                .map(|(name, property)| Parameter {
                    name: name.clone(),
                    location,
                    required: location == ParameterIn::Path || required.contains(&name.as_str()),
                    schema: property.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn json_content(schema: &SharedSchema) -> IndexMap<String, MediaType> {
    let schema = schema.reflect().unwrap_or_else(|| json!({}));
    IndexMap::from([("application/json".to_owned(), MediaType { schema })])
}
