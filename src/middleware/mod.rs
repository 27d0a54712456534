//! Schema-guarded middleware.
//!
//! A [`Middleware`] runs before the route handler. It declares the request
//! fields it needs (and the responses it may produce), receives a
//! [`Context`] holding exactly those validated fields, and either
//!
//! - ends the request by returning a [`Response`] ([`Outcome::Respond`]), or
//! - contributes a record of values ([`Outcome::Extend`]) that the handler
//!   later reads with [`ExtendedContext::get`](crate::ExtendedContext::get).
//!
//! Middleware never see each other's data.
//!
//! ```rust
//! use covenant::{Context, JsonSchema, Middleware, RequestSchema, ResponseSchema};
//! use serde_json::json;
//!
//! # fn build() -> Result<Middleware, covenant::Error> {
//! let auth = Middleware::new("auth", |ctx: Context| async move {
//!     match ctx.request().header("x-api-key") {
//!         Some(key) if key == "secret" => Ok(json!({ "user": "alice" })),
//!         _ => Err(ctx.json(401, json!({ "error": "unauthorized" })).await),
//!     }
//! })
//! .request(RequestSchema::new().headers(JsonSchema::new(json!({
//!     "type": "object",
//!     "required": ["x-api-key"],
//! }))?))
//! .response(ResponseSchema::new().status(401, JsonSchema::new(json!({
//!     "type": "object",
//!     "properties": { "error": { "type": "string" } },
//! }))?));
//! # Ok(auth)
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::BoxError;
use crate::handler::BoxFuture;
use crate::response::Response;
use crate::schema::{RequestSchema, ResponseSchema};

/// The result of running one middleware.
#[derive(Debug)]
pub enum Outcome {
    /// Terminal: the pipeline stops and sends this response.
    Respond(Response),
    /// Data to merge into the per-request shared record.
    Extend(Map<String, Value>),
}

impl Outcome {
    /// `true` when the outcome ends the request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Respond(_))
    }
}

impl From<Response> for Outcome {
    fn from(res: Response) -> Self {
        Self::Respond(res)
    }
}

impl From<Map<String, Value>> for Outcome {
    fn from(data: Map<String, Value>) -> Self {
        Self::Extend(data)
    }
}

/// Conversion of a middleware function's return value into an [`Outcome`].
///
/// Besides `Outcome`, `Response` and `Map` themselves:
///
/// - `()` contributes nothing,
/// - a JSON object contributes its entries, any other JSON value is an error,
/// - `Result<T, Response>` short-circuits with the `Err` response,
/// - `Result<T, E>` for a boxed error type fails the request with a `500`.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<Outcome, BoxError>;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Result<Outcome, BoxError> { Ok(self) }
}

impl IntoOutcome for Response {
    fn into_outcome(self) -> Result<Outcome, BoxError> { Ok(Outcome::Respond(self)) }
}

impl IntoOutcome for Map<String, Value> {
    fn into_outcome(self) -> Result<Outcome, BoxError> { Ok(Outcome::Extend(self)) }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<Outcome, BoxError> { Ok(Outcome::Extend(Map::new())) }
}

impl IntoOutcome for Value {
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        match self {
            Value::Object(data) => Ok(Outcome::Extend(data)),
            other => Err(format!("middleware returned a non-object value: {other}").into()),
        }
    }
}

impl<T: IntoOutcome> IntoOutcome for Result<T, Response> {
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        match self {
            Ok(value) => value.into_outcome(),
            Err(res) => Ok(Outcome::Respond(res)),
        }
    }
}

impl<T: IntoOutcome> IntoOutcome for Result<T, BoxError> {
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        self?.into_outcome()
    }
}

type MiddlewareFn = dyn Fn(Context) -> BoxFuture<'static, Result<Outcome, BoxError>> + Send + Sync;

/// A named, schema-guarded unit of pre-handler logic.
///
/// Built once at startup and shared (`Arc`) between every route it guards.
pub struct Middleware {
    name: String,
    request: Option<RequestSchema>,
    response: Option<ResponseSchema>,
    run: Arc<MiddlewareFn>,
}

impl Middleware {
    pub fn new<F, Fut, R>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + Send + 'static,
    {
        let run = move |ctx: Context| -> BoxFuture<'static, Result<Outcome, BoxError>> {
            let fut = f(ctx);
            Box::pin(async move { fut.await.into_outcome() })
        };
        Self { name: name.into(), request: None, response: None, run: Arc::new(run) }
    }

    /// Declares the request fields this middleware validates and reads.
    pub fn request(mut self, schema: RequestSchema) -> Self {
        self.request = Some(schema);
        self
    }

    /// Declares the responses this middleware may produce.
    pub fn response(mut self, schema: ResponseSchema) -> Self {
        self.response = Some(schema);
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn request_schema(&self) -> Option<&RequestSchema> { self.request.as_ref() }
    pub fn response_schema(&self) -> Option<&ResponseSchema> { self.response.as_ref() }

    /// Runs the middleware function. Schema validation happens before this,
    /// in the pipeline.
    pub async fn execute(&self, ctx: Context) -> Result<Outcome, BoxError> {
        (self.run)(ctx).await
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("name", &self.name)
            .field("request", &self.request)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn terminal_predicate() {
        assert!(Outcome::Respond(Response::empty(401)).is_terminal());
        assert!(!Outcome::Extend(Map::new()).is_terminal());
    }

    #[test]
    fn json_objects_extend_other_values_fail() {
        let Outcome::Extend(data) = json!({ "a": 1 }).into_outcome().unwrap() else {
            panic!("expected data");
        };
        assert_eq!(data["a"], json!(1));
        assert!(json!([1, 2]).into_outcome().is_err());
    }

    #[test]
    fn err_response_short_circuits() {
        let denied: Result<Value, Response> = Err(Response::empty(403));
        assert!(denied.into_outcome().unwrap().is_terminal());
    }

    #[test]
    fn boxed_error_fails() {
        let failed: Result<(), BoxError> = Err("redis down".into());
        assert_eq!(failed.into_outcome().unwrap_err().to_string(), "redis down");
    }
}
