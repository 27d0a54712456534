//! Turning a raw [`Request`] into JSON-shaped fields.
//!
//! Parsing is driven by the effective request contract: the body is parsed
//! only when some schema declares it, and the header record is only built
//! when some schema declares headers.

use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::error::PipelineError;
use crate::request::Request;
use crate::schema::{Field, RequestSchema};

/// Unvalidated request fields, parsed once per request.
#[derive(Debug, Default)]
pub(crate) struct Parsed {
    body: Option<Value>,
    params: Map<String, Value>,
    query: Map<String, Value>,
    headers: Option<Map<String, Value>>,
    cookies: Map<String, Value>,
}

impl Parsed {
    /// The raw value for `field`; `null` for anything that was not parsed.
    pub(crate) fn field(&self, field: Field) -> Value {
        match field {
            Field::Body     => self.body.clone().unwrap_or(Value::Null),
            Field::Params   => Value::Object(self.params.clone()),
            Field::Query    => Value::Object(self.query.clone()),
            Field::Headers  => self.headers.clone().map_or(Value::Null, Value::Object),
            Field::Cookies  => Value::Object(self.cookies.clone()),
            Field::Response => Value::Null,
        }
    }
}

pub(crate) fn parse(req: &Request, contract: &RequestSchema) -> Result<Parsed, PipelineError> {
    let body = if contract.declares(Field::Body) {
        Some(parse_body(req).map_err(|e| e.at(Field::Body))?)
    } else {
        None
    };

    let headers = contract.declares(Field::Headers).then(|| header_record(req));

    Ok(Parsed {
        body,
        params: req.params().iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
        query: parse_query(req.query().unwrap_or_default()),
        headers,
        cookies: parse_cookies(req),
    })
}

/// Query string to record. A key seen once maps to a string; a repeated key
/// maps to a list of its values in order of appearance.
pub(crate) fn parse_query(query: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match out.get_mut(&*key) {
            None => {
                out.insert(key.into_owned(), value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    out
}

/// `cookie: a=1; b=2` headers to record. Names and values are trimmed;
/// pairs without `=` are ignored.
pub(crate) fn parse_cookies(req: &Request) -> Map<String, Value> {
    req.header_all("cookie")
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_owned(), Value::String(value.to_owned())))
        .collect()
}

/// Headers keyed by lowercase name. Repeated headers are joined with `", "`.
fn header_record(req: &Request) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, value) in req.headers() {
        match out.get_mut(&name.to_ascii_lowercase()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            _ => {
                out.insert(name.to_ascii_lowercase(), Value::String(value.clone()));
            }
        }
    }
    out
}

fn parse_body(req: &Request) -> Result<Value, PipelineError> {
    if req.body().is_empty() {
        return Ok(Value::Null);
    }

    let mime = req.header("content-type")
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") {
        serde_json::from_slice(req.body())
            .map_err(|e| PipelineError::validation(format!("invalid JSON body: {e}")))
    } else if mime == "application/x-www-form-urlencoded" {
        let text = std::str::from_utf8(req.body())
            .map_err(|_| PipelineError::validation("form body is not valid UTF-8"))?;
        Ok(Value::Object(parse_query(text)))
    } else {
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::method::Method;
    use crate::schema::Typed;

    #[test]
    fn repeated_query_keys_collapse_into_a_list() {
        let query = parse_query("tag=a&page=2&tag=b&tag=c%20d");
        assert_eq!(Value::Object(query), json!({ "tag": ["a", "b", "c d"], "page": "2" }));
    }

    #[test]
    fn empty_query() {
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn cookies_are_trimmed() {
        let req = Request::new(Method::Get, "/")
            .with_header("Cookie", " session = abc ; theme=dark;broken; =x")
            .with_header("cookie", "lang=en");

        assert_eq!(
            Value::Object(parse_cookies(&req)),
            json!({ "session": "abc", "theme": "dark", "lang": "en" }),
        );
    }

    #[test]
    fn body_and_headers_only_when_declared() {
        let req = Request::new(Method::Post, "/?q=1")
            .with_header("content-type", "application/json")
            .with_header("X-Trace", "t1")
            .with_body("{not json");

        let parsed = parse(&req, &RequestSchema::new()).unwrap();
        assert_eq!(parsed.field(Field::Body), Value::Null);
        assert_eq!(parsed.field(Field::Headers), Value::Null);
        assert_eq!(parsed.field(Field::Query), json!({ "q": "1" }));
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let req = Request::new(Method::Post, "/")
            .with_header("content-type", "application/json; charset=utf-8")
            .with_body("{not json");

        let contract = RequestSchema::new().body(Typed::<Value>::new());
        let err = parse(&req, &contract).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.field(), Some(Field::Body));
        assert!(err.message().starts_with("invalid JSON body"));
    }

    #[test]
    fn structured_bodies() {
        let contract = RequestSchema::new().body(Typed::<Value>::new());

        let json_req = Request::new(Method::Post, "/")
            .with_header("content-type", "application/vnd.api+json")
            .with_body(r#"{"a":[1,2]}"#);
        assert_eq!(parse(&json_req, &contract).unwrap().field(Field::Body), json!({ "a": [1, 2] }));

        let form_req = Request::new(Method::Post, "/")
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_body("name=alice&role=a&role=b");
        assert_eq!(
            parse(&form_req, &contract).unwrap().field(Field::Body),
            json!({ "name": "alice", "role": ["a", "b"] }),
        );

        let text_req = Request::new(Method::Post, "/")
            .with_header("content-type", "text/plain")
            .with_body("hello");
        assert_eq!(parse(&text_req, &contract).unwrap().field(Field::Body), Value::Null);
    }

    #[test]
    fn header_record_is_lowercased_and_joined() {
        let req = Request::new(Method::Get, "/")
            .with_header("X-Forwarded-For", "10.0.0.1")
            .with_header("x-forwarded-for", "10.0.0.2");
        let contract = RequestSchema::new().headers(Typed::<Value>::new());

        assert_eq!(
            parse(&req, &contract).unwrap().field(Field::Headers),
            json!({ "x-forwarded-for": "10.0.0.1, 10.0.0.2" }),
        );
    }

    #[test]
    fn path_params_come_from_the_match() {
        let params = HashMap::from([("id".to_owned(), "42".to_owned())]);
        let req = Request::new(Method::Get, "/users/42").with_params(params);

        assert_eq!(parse(&req, &RequestSchema::new()).unwrap().field(Field::Params), json!({ "id": "42" }));
    }
}
