//! Per-request context handed to middleware and handlers.
//!
//! Two phases, two types:
//!
//! - [`Context`]: validated request fields, the raw request, and the
//!   response helpers. Middleware receive this.
//! - [`ExtendedContext`]: a `Context` plus the record accumulated from every
//!   middleware that ran. Route handlers receive this.
//!
//! Both are cheap to clone and immutable; extending a context wraps it, it
//! never changes the original.

use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ErrorPolicy, PipelineError};
use crate::request::Request;
use crate::response::Response;
use crate::schema::{self, Field, ResponseSchema};

// ── RequestFields ─────────────────────────────────────────────────────────────

/// The schema-validated request fields.
///
/// A field is present only when the contract in effect declares a schema for
/// it; its value is the schema's output, which may be coerced or defaulted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFields {
    body: Option<Value>,
    params: Option<Value>,
    query: Option<Value>,
    headers: Option<Value>,
    cookies: Option<Value>,
}

impl RequestFields {
    pub fn get(&self, field: Field) -> Option<&Value> {
        match field {
            Field::Body     => self.body.as_ref(),
            Field::Params   => self.params.as_ref(),
            Field::Query    => self.query.as_ref(),
            Field::Headers  => self.headers.as_ref(),
            Field::Cookies  => self.cookies.as_ref(),
            Field::Response => None,
        }
    }

    pub(crate) fn set(&mut self, field: Field, value: Value) {
        let slot = match field {
            Field::Body     => &mut self.body,
            Field::Params   => &mut self.params,
            Field::Query    => &mut self.query,
            Field::Headers  => &mut self.headers,
            Field::Cookies  => &mut self.cookies,
            Field::Response => return,
        };
        *slot = Some(value);
    }

    pub fn body(&self) -> Option<&Value> { self.body.as_ref() }
    pub fn params(&self) -> Option<&Value> { self.params.as_ref() }
    pub fn query(&self) -> Option<&Value> { self.query.as_ref() }
    pub fn headers(&self) -> Option<&Value> { self.headers.as_ref() }
    pub fn cookies(&self) -> Option<&Value> { self.cookies.as_ref() }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }

    pub fn query_param(&self, name: &str) -> Option<&Value> {
        self.query.as_ref()?.get(name)
    }

    /// Header lookup. Header records are keyed by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_ref()?.get(name.to_ascii_lowercase())?.as_str()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.as_ref()?.get(name)?.as_str()
    }

    /// Deserializes the validated body. A missing body deserializes from `null`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.body.as_ref().unwrap_or(&Value::Null))
    }

    pub fn is_empty(&self) -> bool {
        Field::REQUEST.iter().all(|f| self.get(*f).is_none())
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

struct Shared {
    raw: Arc<Request>,
    responses: Arc<ResponseSchema>,
    errors: ErrorPolicy,
}

/// The context middleware run with.
#[derive(Clone)]
pub struct Context {
    request: Arc<RequestFields>,
    shared: Arc<Shared>,
}

impl Context {
    pub(crate) fn new(
        request: RequestFields,
        raw: Arc<Request>,
        responses: Arc<ResponseSchema>,
        errors: ErrorPolicy,
    ) -> Self {
        Self {
            request: Arc::new(request),
            shared: Arc::new(Shared { raw, responses, errors }),
        }
    }

    /// Same request, different view of the validated fields.
    pub(crate) fn scoped(&self, request: RequestFields) -> Self {
        Self { request: Arc::new(request), shared: Arc::clone(&self.shared) }
    }

    pub fn request(&self) -> &RequestFields {
        &self.request
    }

    /// The request as received, for anything the contract does not cover.
    pub fn raw(&self) -> &Request {
        &self.shared.raw
    }

    /// A JSON response, checked against the schema declared for `status`.
    ///
    /// The body sent is the schema's output. If `data` does not satisfy the
    /// schema the result is a `500`: a response that breaks its own contract
    /// is a server fault, not a client one. A status without a declared
    /// schema is sent as-is.
    pub async fn json<T: Serialize>(&self, status: u16, data: T) -> Response {
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                let err = PipelineError::internal(format!("response body is not serializable: {e}"));
                return self.fail(err.at(Field::Response));
            }
        };

        let schema = self.shared.responses.get(status).map(|s| &**s);
        match schema::validate(schema, value).await {
            Ok(validated) => Response::builder()
                .status(status)
                .json(validated.to_string().into_bytes()),
            Err(rejected) => {
                let err = PipelineError::internal(format!(
                    "response for status {status} broke its schema: {}",
                    rejected.message(),
                ));
                self.fail(err.at(Field::Response))
            }
        }
    }

    /// A plain-text response. Not checked against the response contract.
    pub fn text(&self, status: u16, body: impl Into<String>) -> Response {
        Response::builder().status(status).text(body)
    }

    /// An HTML response. Not checked against the response contract.
    pub fn html(&self, status: u16, body: impl Into<String>) -> Response {
        Response::builder().status(status).html(body)
    }

    pub fn redirect(&self, status: u16, location: &str) -> Response {
        Response::builder().status(status).header("location", location).no_body()
    }

    fn fail(&self, err: PipelineError) -> Response {
        self.shared.errors.respond(&err)
    }
}

// ── ExtendedContext ───────────────────────────────────────────────────────────

/// The context route handlers run with: a [`Context`] plus the data
/// contributed by middleware.
///
/// Dereferences to [`Context`], so the request fields and response helpers
/// are available directly.
#[derive(Clone)]
pub struct ExtendedContext {
    base: Context,
    data: Arc<Map<String, Value>>,
}

impl ExtendedContext {
    pub(crate) fn new(base: Context, data: Map<String, Value>) -> Self {
        Self { base, data: Arc::new(data) }
    }

    /// A value contributed by middleware. Later middleware overwrite earlier
    /// ones on the same key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Like [`get`](Self::get), deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<Result<T, serde_json::Error>> {
        self.data.get(key).map(T::deserialize)
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

impl Deref for ExtendedContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::method::Method;
    use crate::schema::JsonSchema;

    fn context(responses: ResponseSchema) -> Context {
        let raw = Arc::new(Request::new(Method::Get, "/"));
        Context::new(RequestFields::default(), raw, Arc::new(responses), ErrorPolicy::default())
    }

    fn named() -> ResponseSchema {
        ResponseSchema::new().status(200, JsonSchema::new(json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"],
        })).unwrap())
    }

    fn body(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[tokio::test]
    async fn json_sends_valid_data_with_its_status() {
        let res = context(named()).json(200, json!({ "name": "alice" })).await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(body(&res), json!({ "name": "alice" }));
    }

    #[tokio::test]
    async fn json_contract_violation_is_a_server_error() {
        let res = context(named()).json(200, json!({ "name": 7 })).await;
        assert_eq!(res.status(), 500);
        assert_eq!(body(&res), json!({ "message": "Internal server error" }));
    }

    #[tokio::test]
    async fn undeclared_status_passes_through() {
        let res = context(named()).json(202, json!([1, 2])).await;
        assert_eq!(res.status(), 202);
        assert_eq!(body(&res), json!([1, 2]));
    }

    #[test]
    fn text_html_and_redirect_skip_the_contract() {
        let ctx = context(named());

        let text = ctx.text(200, "not json");
        assert_eq!(text.header("content-type"), Some("text/plain; charset=utf-8"));

        let html = ctx.html(404, "<h1>gone</h1>");
        assert_eq!(html.status(), 404);
        assert_eq!(html.header("content-type"), Some("text/html; charset=utf-8"));

        let redirect = ctx.redirect(302, "/login");
        assert_eq!(redirect.status(), 302);
        assert_eq!(redirect.header("location"), Some("/login"));
        assert!(redirect.body().is_empty());
    }

    #[test]
    fn field_accessors() {
        let mut fields = RequestFields::default();
        assert!(fields.is_empty());

        fields.set(Field::Headers, json!({ "x-key": "k" }));
        fields.set(Field::Cookies, json!({ "session": "abc" }));
        fields.set(Field::Body, json!({ "n": 3 }));

        assert_eq!(fields.header("X-Key"), Some("k"));
        assert_eq!(fields.cookie("session"), Some("abc"));
        assert_eq!(fields.body_as::<Value>().unwrap()["n"], json!(3));
        assert!(fields.param("id").is_none());
    }

    #[test]
    fn extension_keeps_the_base_untouched() {
        let base = context(ResponseSchema::new());
        let mut data = Map::new();
        data.insert("user".to_owned(), json!({ "id": 7 }));

        let extended = ExtendedContext::new(base.clone(), data);

        assert_eq!(extended.get("user"), Some(&json!({ "id": 7 })));
        assert_eq!(extended.get_as::<Value>("missing").map(|r| r.is_ok()), None);
        assert!(extended.request().is_empty());
        assert!(base.request().is_empty());
    }
}
