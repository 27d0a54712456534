use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Issue, Schema};
use crate::handler::BoxFuture;

/// Uses a serde type as a schema.
///
/// Input is deserialized into `T` and serialized back, so `#[serde(default)]`,
/// renames and custom deserializers all show up in the validated output.
/// serde types cannot describe themselves; attach a JSON Schema with
/// [`Typed::describe`] if the route should be documented.
///
/// ```rust
/// use covenant::Typed;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize, Serialize)]
/// struct Page {
///     #[serde(default)]
///     limit: Option<String>,
/// }
///
/// let schema = Typed::<Page>::new();
/// ```
pub struct Typed<T> {
    reflection: Option<Value>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    pub fn new() -> Self {
        Self { reflection: None, _marker: PhantomData }
    }

    /// Supplies the JSON Schema reported by [`Schema::reflect`].
    pub fn describe(mut self, reflection: Value) -> Self {
        self.reflection = Some(reflection);
        self
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Schema for Typed<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    fn validate(&self, input: Value) -> BoxFuture<'_, Result<Value, Vec<Issue>>> {
        let checked = serde_json::from_value::<T>(input)
            .map_err(|e| vec![Issue::root(e.to_string())])
            .and_then(|parsed| {
                serde_json::to_value(parsed).map_err(|e| vec![Issue::root(e.to_string())])
            });
        Box::pin(async move { checked })
    }

    fn reflect(&self) -> Option<Value> {
        self.reflection.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Deserialize, Serialize)]
    struct Search {
        term: String,
        #[serde(default = "default_limit")]
        limit: u32,
    }

    fn default_limit() -> u32 { 20 }

    #[tokio::test]
    async fn output_includes_defaults() {
        let out = Typed::<Search>::new().validate(json!({ "term": "rust" })).await.unwrap();
        assert_eq!(out, json!({ "term": "rust", "limit": 20 }));
    }

    #[tokio::test]
    async fn rejection_has_a_message() {
        let issues = Typed::<Search>::new().validate(json!({ "limit": 3 })).await.unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("term"));
    }

    #[test]
    fn reflection_is_opt_in() {
        assert!(Typed::<Search>::new().reflect().is_none());
        let described = Typed::<Search>::new().describe(json!({ "type": "object" }));
        assert_eq!(described.reflect(), Some(json!({ "type": "object" })));
    }
}
