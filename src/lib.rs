//! # covenant
//!
//! Contract-first HTTP routing. Declare a route once, with schemas for what
//! it accepts and what it returns, and covenant
//!
//! - parses and validates every request against those schemas,
//! - runs an ordered chain of schema-guarded middleware that can stop the
//!   request or contribute data to it,
//! - checks every JSON response against the schema declared for its status,
//! - and derives an OpenAPI document from the very same declarations.
//!
//! covenant has no schema language of its own. Anything implementing
//! [`Schema`] can guard a route; JSON Schema ([`JsonSchema`]) and serde types
//! ([`Typed`]) work out of the box.
//!
//! ## The pipeline
//!
//! For every request, strictly in this order, stopping at the first failure:
//!
//! 1. parse query, cookies, path params, and (only if declared) headers and body
//! 2. validate the route's own fields → `400` on failure
//! 3. for each middleware, process-wide first: validate its fields → `400`,
//!    run it → a response ends the request, a record is merged
//! 4. run the handler with the merged record → `500` if it fails
//!
//! Errors are `{"message": ..}` JSON. Internal causes are logged, never sent.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use covenant::{ExtendedContext, JsonSchema, RequestSchema, Route, Router, Server};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), covenant::Error> {
//!     let user = JsonSchema::new(json!({
//!         "type": "object",
//!         "properties": { "id": { "type": "string" }, "name": { "type": "string" } },
//!         "required": ["id", "name"],
//!     }))?;
//!     let params = JsonSchema::new(json!({
//!         "type": "object",
//!         "properties": { "id": { "type": "string", "pattern": "^[0-9]+$" } },
//!         "required": ["id"],
//!     }))?;
//!
//!     let app = Router::new()
//!         .route(
//!             Route::get("/users/{id}", get_user)
//!                 .request(RequestSchema::new().params(params))
//!                 .response(200, user),
//!         )
//!         .openapi_at("/openapi.json");
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_user(ctx: ExtendedContext) -> covenant::Response {
//!     let id = ctx.request().param("id").cloned();
//!     ctx.json(200, json!({ "id": id, "name": "alice" })).await
//! }
//! ```

mod context;
mod error;
mod handler;
mod method;
mod parse;
mod pipeline;
mod request;
mod response;
mod route;
mod router;
mod server;

pub mod middleware;
pub mod openapi;
pub mod schema;

pub use context::{Context, ExtendedContext, RequestFields};
pub use error::{BoxError, Error, ErrorHook, ErrorKind, PipelineError};
pub use handler::{BoxFuture, Handler, Reply};
pub use method::Method;
pub use middleware::{IntoOutcome, Middleware, Outcome};
pub use openapi::{Info, OpenApi};
pub use request::Request;
pub use response::{ContentType, Response, ResponseBuilder};
pub use route::{Route, RouteDoc};
pub use router::{App, InternalRoute, Router};
pub use schema::{Field, Issue, JsonSchema, RequestSchema, ResponseSchema, Schema, SharedSchema, Typed};
pub use server::Server;
