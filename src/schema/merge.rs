//! Combining contracts from middleware and routes.
//!
//! Sources are passed in precedence order: process-wide middleware, then
//! route middleware, then the route itself. Later sources win.

use super::contract::{Field, RequestSchema, ResponseSchema};

/// Merges request contracts slot by slot; the last source that fills a slot wins.
pub fn merge_request<'a, I>(sources: I) -> RequestSchema
where
    I: IntoIterator<Item = Option<&'a RequestSchema>>,
{
    sources.into_iter().flatten().fold(RequestSchema::new(), |merged, source| {
        Field::REQUEST.iter().fold(merged, |merged, field| match source.get(*field) {
            Some(schema) => merged.set(*field, schema.clone()),
            None => merged,
        })
    })
}

/// Unions response contracts; a later schema for an already declared status
/// replaces the earlier one.
pub fn merge_response<'a, I>(sources: I) -> ResponseSchema
where
    I: IntoIterator<Item = Option<&'a ResponseSchema>>,
{
    sources.into_iter().flatten().fold(ResponseSchema::new(), |merged, source| {
        source.iter().fold(merged, |merged, (code, schema)| merged.set(code, schema.clone()))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::schema::{JsonSchema, SharedSchema};

    fn schema(title: &str) -> SharedSchema {
        Arc::new(JsonSchema::new(json!({ "title": title })).unwrap())
    }

    fn title(schema: &SharedSchema) -> String {
        schema.reflect().unwrap()["title"].as_str().unwrap().to_owned()
    }

    #[test]
    fn last_non_empty_slot_wins() {
        let global = RequestSchema::new()
            .set(Field::Headers, schema("global-headers"))
            .set(Field::Body, schema("global-body"));
        let route_mw = RequestSchema::new().set(Field::Headers, schema("mw-headers"));
        let route = RequestSchema::new().set(Field::Params, schema("route-params"));

        let merged = merge_request([Some(&global), Some(&route_mw), None, Some(&route)]);

        assert_eq!(title(merged.get(Field::Headers).unwrap()), "mw-headers");
        assert_eq!(title(merged.get(Field::Body).unwrap()), "global-body");
        assert_eq!(title(merged.get(Field::Params).unwrap()), "route-params");
        assert!(!merged.declares(Field::Query));
    }

    #[test]
    fn merging_twice_changes_nothing() {
        let a = RequestSchema::new().set(Field::Query, schema("a"));
        let b = RequestSchema::new().set(Field::Query, schema("b"));

        let once = merge_request([Some(&a), Some(&b)]);
        let twice = merge_request([Some(&once), Some(&b)]);

        assert_eq!(title(twice.get(Field::Query).unwrap()), "b");
    }

    #[test]
    fn order_matters() {
        let a = RequestSchema::new().set(Field::Query, schema("a"));
        let b = RequestSchema::new().set(Field::Query, schema("b"));

        assert_eq!(title(merge_request([Some(&b), Some(&a)]).get(Field::Query).unwrap()), "a");
    }

    #[test]
    fn response_codes_are_unioned_and_overridden() {
        let auth = ResponseSchema::new().set(401, schema("auth-401")).set(200, schema("auth-200"));
        let route = ResponseSchema::new().set(200, schema("route-200")).set(404, schema("route-404"));

        let merged = merge_response([Some(&auth), Some(&route)]);

        assert_eq!(merged.codes().collect::<Vec<_>>(), vec![401, 200, 404]);
        assert_eq!(title(merged.get(200).unwrap()), "route-200");
        assert_eq!(title(merged.get(401).unwrap()), "auth-401");
    }

    #[test]
    fn nothing_to_merge() {
        assert!(merge_request([None::<&RequestSchema>, None]).is_empty());
        assert!(merge_response(std::iter::empty::<Option<&ResponseSchema>>()).is_empty());
    }
}
