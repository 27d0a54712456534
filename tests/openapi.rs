//! The generated API document and the endpoint serving it.

use covenant::{
    Context, ExtendedContext, Info, JsonSchema, Method, Middleware, Request, RequestSchema,
    ResponseSchema, Route, Router,
};
use serde_json::{Value, json};

fn schema(document: Value) -> JsonSchema {
    JsonSchema::new(document).unwrap()
}

fn user_router() -> Router {
    let auth = Middleware::new("auth", |_ctx: Context| async {})
        .request(RequestSchema::new().headers(schema(json!({
            "type": "object",
            "properties": { "authorization": { "type": "string" } },
            "required": ["authorization"],
        }))))
        .response(ResponseSchema::new().status(401, schema(json!({ "type": "object" }))));

    Router::new()
        .prefix("/api")
        .info(Info::new("Users", "2.0.0").description("user directory"))
        .with(auth)
        .route(
            Route::get("/users/{id}", |ctx: ExtendedContext| async move { ctx.json(200, json!({})).await })
                .summary("Fetch a user")
                .operation_id("getUser")
                .tag("users")
                .request(RequestSchema::new().params(schema(json!({
                    "type": "object",
                    "properties": { "id": { "type": "string" } },
                }))))
                .response(200, schema(json!({ "type": "object", "properties": { "id": { "type": "string" } } }))),
        )
        .route(
            Route::post("/users", |ctx: ExtendedContext| async move { ctx.json(201, json!({})).await })
                .request(RequestSchema::new().body(schema(json!({
                    "type": "object",
                    "properties": { "name": { "type": "string" } },
                }))))
                .response(201, schema(json!({ "type": "object" }))),
        )
        .route(
            Route::get("/files/{*path}", |ctx: ExtendedContext| async move { ctx.text(200, "file") })
                .response(200, schema(json!({ "type": "string" }))),
        )
}

#[test]
fn document_reflects_routes_middleware_and_metadata() {
    let app = user_router().build().unwrap();
    let doc = serde_json::to_value(app.openapi()).unwrap();

    assert_eq!(doc["openapi"], "3.1.0");
    assert_eq!(doc["info"], json!({ "title": "Users", "description": "user directory", "version": "2.0.0" }));

    let paths: Vec<&str> = doc["paths"].as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(paths, ["/api/users/{id}", "/api/users", "/api/files/{*path}"]);

    let get_user = &doc["paths"]["/api/users/{id}"]["get"];
    assert_eq!(get_user["operationId"], "getUser");
    assert_eq!(get_user["summary"], "Fetch a user");
    assert_eq!(get_user["tags"], json!(["users"]));
    assert_eq!(get_user["parameters"], json!([
        { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } },
        { "name": "authorization", "in": "header", "required": true, "schema": { "type": "string" } },
    ]));
    assert_eq!(get_user["responses"]["200"]["description"], "OK");
    assert_eq!(get_user["responses"]["401"]["description"], "Unauthorized");
    assert!(get_user.get("requestBody").is_none());

    let create_user = &doc["paths"]["/api/users"]["post"];
    assert_eq!(create_user["requestBody"]["required"], true);
    assert_eq!(
        create_user["requestBody"]["content"]["application/json"]["schema"]["properties"]["name"],
        json!({ "type": "string" }),
    );
    assert_eq!(
        create_user["responses"]["201"]["content"]["application/json"]["schema"],
        json!({ "type": "object" }),
    );
}

#[test]
fn path_templates_survive_registration() {
    let app = user_router().build().unwrap();
    let templates: Vec<String> = app.routes().iter().map(|r| r.template()).collect();
    let transport: Vec<&str> = app.routes().iter().map(|r| r.path()).collect();

    assert_eq!(templates, ["/api/users/{id}", "/api/users", "/api/files/{*path}"]);
    assert_eq!(transport, ["/api/users/:id", "/api/users", "/api/files/*path"]);
}

#[tokio::test]
async fn document_is_served_when_configured() {
    let app = user_router().openapi_at("/openapi.json").build().unwrap();

    let res = app.handle(Request::new(Method::Get, "/api/openapi.json")).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.header("content-type"), Some("application/json"));

    let served: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(served, serde_json::to_value(app.openapi()).unwrap());

    let res = app.handle(Request::new(Method::Post, "/api/openapi.json")).await;
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn document_is_not_served_by_default() {
    let app = user_router().build().unwrap();
    let res = app.handle(Request::new(Method::Get, "/api/openapi.json")).await;
    assert_eq!(res.status(), 404);
}
