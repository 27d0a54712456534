//! Declarative route definitions.

use std::fmt;
use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::Middleware;
use crate::schema::{RequestSchema, ResponseSchema, Schema, SharedSchema};

/// Documentation attached to a route and copied into the generated spec.
#[derive(Debug, Clone, Default)]
pub struct RouteDoc {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
    pub tags: Vec<String>,
}

/// A route as declared: method, path template, contracts, middleware,
/// handler.
///
/// Path templates use `{name}` placeholders and `{*name}` for a trailing
/// catch-all. At least one response status must be declared.
///
/// ```rust
/// use covenant::{ExtendedContext, JsonSchema, RequestSchema, Route};
/// use serde_json::json;
///
/// # fn build() -> Result<Route, covenant::Error> {
/// let route = Route::get("/users/{id}", |ctx: ExtendedContext| async move {
///     let id = ctx.request().param("id").cloned();
///     ctx.json(200, json!({ "id": id })).await
/// })
/// .summary("Fetch a user")
/// .request(RequestSchema::new().params(JsonSchema::new(json!({
///     "type": "object",
///     "properties": { "id": { "type": "string" } },
///     "required": ["id"],
/// }))?))
/// .response(200, JsonSchema::new(json!({ "type": "object" }))?);
/// # Ok(route)
/// # }
/// ```
pub struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) doc: RouteDoc,
    pub(crate) request: Option<RequestSchema>,
    pub(crate) responses: ResponseSchema,
    pub(crate) middleware: Vec<Arc<Middleware>>,
    pub(crate) handler: BoxedHandler,
}

impl Route {
    pub fn new(method: Method, path: &str, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.to_owned(),
            doc: RouteDoc::default(),
            request: None,
            responses: ResponseSchema::new(),
            middleware: Vec::new(),
            handler: handler.into_boxed_handler(),
        }
    }

    pub fn get(path: &str, handler: impl Handler) -> Self { Self::new(Method::Get, path, handler) }
    pub fn post(path: &str, handler: impl Handler) -> Self { Self::new(Method::Post, path, handler) }
    pub fn put(path: &str, handler: impl Handler) -> Self { Self::new(Method::Put, path, handler) }
    pub fn delete(path: &str, handler: impl Handler) -> Self { Self::new(Method::Delete, path, handler) }
    pub fn patch(path: &str, handler: impl Handler) -> Self { Self::new(Method::Patch, path, handler) }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.doc.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.doc.description = Some(description.into());
        self
    }

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.doc.operation_id = Some(id.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.doc.tags.push(tag.into());
        self
    }

    pub fn request(mut self, schema: RequestSchema) -> Self {
        self.request = Some(schema);
        self
    }

    /// Declares the response schema for `status`.
    pub fn response(mut self, status: u16, schema: impl Schema) -> Self {
        self.responses = self.responses.status(status, schema);
        self
    }

    pub fn response_shared(mut self, status: u16, schema: SharedSchema) -> Self {
        self.responses = self.responses.set(status, schema);
        self
    }

    /// Replaces the whole response contract.
    pub fn responses(mut self, schema: ResponseSchema) -> Self {
        self.responses = schema;
        self
    }

    /// Appends a route-specific middleware. Runs after every process-wide one.
    pub fn middleware(mut self, middleware: impl Into<Arc<Middleware>>) -> Self {
        self.middleware.push(middleware.into());
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("doc", &self.doc)
            .field("request", &self.request)
            .field("responses", &self.responses)
            .field("middleware", &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
