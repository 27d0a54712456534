//! Minimal covenant example: a small user API guarded by an API-key
//! middleware, with its OpenAPI document served alongside.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/users/42 -H 'x-api-key: secret'
//!   curl http://localhost:3000/api/users/abc -H 'x-api-key: secret'
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'x-api-key: secret' \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl http://localhost:3000/api/users/42
//!   curl http://localhost:3000/api/openapi.json

use std::sync::Arc;

use covenant::{
    Context, ExtendedContext, Info, JsonSchema, Middleware, RequestSchema, ResponseSchema, Route,
    Router, Server, SharedSchema,
};
use serde_json::{Value, json};

#[tokio::main]
async fn main() -> Result<(), covenant::Error> {
    tracing_subscriber::fmt::init();

    let user: SharedSchema = Arc::new(JsonSchema::new(json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "name": { "type": "string" },
            "created_by": { "type": "string" },
        },
        "required": ["id", "name"],
    }))?);
    let new_user = JsonSchema::new(json!({
        "type": "object",
        "properties": { "name": { "type": "string", "minLength": 1 } },
        "required": ["name"],
    }))?;
    let user_params = JsonSchema::new(json!({
        "type": "object",
        "properties": { "id": { "type": "string", "pattern": "^[0-9]+$" } },
        "required": ["id"],
    }))?;

    let app = Router::new()
        .prefix("/api")
        .info(Info::new("Users", "0.1.0").description("covenant demo"))
        .with(api_key()?)
        .route(
            Route::get("/users/{id}", get_user)
                .summary("Fetch one user")
                .tag("users")
                .request(RequestSchema::new().params(user_params))
                .response_shared(200, Arc::clone(&user)),
        )
        .route(
            Route::post("/users", create_user)
                .summary("Create a user")
                .tag("users")
                .request(RequestSchema::new().body(new_user))
                .response_shared(201, user),
        )
        .openapi_at("/openapi.json");

    Server::bind("0.0.0.0:3000").serve(app).await
}

fn api_key() -> Result<Middleware, covenant::Error> {
    let headers = JsonSchema::new(json!({
        "type": "object",
        "properties": { "x-api-key": { "type": "string" } },
    }))?;
    let unauthorized = JsonSchema::new(json!({
        "type": "object",
        "properties": { "message": { "type": "string" } },
        "required": ["message"],
    }))?;

    Ok(Middleware::new("api-key", |ctx: Context| async move {
        match ctx.request().header("x-api-key") {
            Some("secret") => Ok(json!({ "caller": "demo" })),
            _ => Err(ctx.json(401, json!({ "message": "missing or wrong api key" })).await),
        }
    })
    .request(RequestSchema::new().headers(headers))
    .response(ResponseSchema::new().status(401, unauthorized)))
}

async fn get_user(ctx: ExtendedContext) -> covenant::Response {
    let id = ctx.request().param("id").cloned().unwrap_or(Value::Null);
    ctx.json(200, json!({ "id": id, "name": "alice" })).await
}

async fn create_user(ctx: ExtendedContext) -> covenant::Response {
    let name = ctx.request().body().and_then(|b| b.get("name")).cloned().unwrap_or(Value::Null);
    let caller = ctx.get("caller").cloned().unwrap_or(Value::Null);
    ctx.json(201, json!({ "id": "1", "name": name, "created_by": caller })).await
}
