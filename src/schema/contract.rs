//! Request and response contracts.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::{Schema, SharedSchema};

/// A part of the exchange a schema can guard.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Field {
    Body,
    Params,
    Query,
    Headers,
    Cookies,
    /// The outgoing body; only used to tag response-validation failures.
    Response,
}

impl Field {
    /// The five request slots, in validation order.
    pub const REQUEST: [Field; 5] = [
        Field::Body,
        Field::Params,
        Field::Query,
        Field::Headers,
        Field::Cookies,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Body     => "body",
            Self::Params   => "params",
            Self::Query    => "query",
            Self::Headers  => "headers",
            Self::Cookies  => "cookies",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Up to five independently optional request schemas.
///
/// An empty slot means the field is neither validated nor exposed.
#[derive(Clone, Default)]
pub struct RequestSchema {
    pub(crate) body: Option<SharedSchema>,
    pub(crate) params: Option<SharedSchema>,
    pub(crate) query: Option<SharedSchema>,
    pub(crate) headers: Option<SharedSchema>,
    pub(crate) cookies: Option<SharedSchema>,
}

impl RequestSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(self, schema: impl Schema) -> Self { self.set(Field::Body, Arc::new(schema)) }
    pub fn params(self, schema: impl Schema) -> Self { self.set(Field::Params, Arc::new(schema)) }
    pub fn query(self, schema: impl Schema) -> Self { self.set(Field::Query, Arc::new(schema)) }
    pub fn headers(self, schema: impl Schema) -> Self { self.set(Field::Headers, Arc::new(schema)) }
    pub fn cookies(self, schema: impl Schema) -> Self { self.set(Field::Cookies, Arc::new(schema)) }

    /// Fills `field` with an already shared schema.
    pub fn set(mut self, field: Field, schema: SharedSchema) -> Self {
        if let Some(slot) = self.slot_mut(field) {
            *slot = Some(schema);
        }
        self
    }

    pub fn get(&self, field: Field) -> Option<&SharedSchema> {
        match field {
            Field::Body     => self.body.as_ref(),
            Field::Params   => self.params.as_ref(),
            Field::Query    => self.query.as_ref(),
            Field::Headers  => self.headers.as_ref(),
            Field::Cookies  => self.cookies.as_ref(),
            Field::Response => None,
        }
    }

    pub fn declares(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    pub fn is_empty(&self) -> bool {
        Field::REQUEST.iter().all(|f| !self.declares(*f))
    }

    fn slot_mut(&mut self, field: Field) -> Option<&mut Option<SharedSchema>> {
        match field {
            Field::Body     => Some(&mut self.body),
            Field::Params   => Some(&mut self.params),
            Field::Query    => Some(&mut self.query),
            Field::Headers  => Some(&mut self.headers),
            Field::Cookies  => Some(&mut self.cookies),
            Field::Response => None,
        }
    }
}

impl fmt::Debug for RequestSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let declared: Vec<_> = Field::REQUEST.iter().filter(|f| self.declares(**f)).collect();
        f.debug_struct("RequestSchema").field("declared", &declared).finish()
    }
}

/// Response schemas keyed by status code, in declaration order.
#[derive(Clone, Default)]
pub struct ResponseSchema {
    pub(crate) entries: IndexMap<u16, SharedSchema>,
}

impl ResponseSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the schema for `code`. A later call for the same code replaces
    /// the schema but keeps the original position.
    pub fn status(self, code: u16, schema: impl Schema) -> Self {
        self.set(code, Arc::new(schema))
    }

    pub fn set(mut self, code: u16, schema: SharedSchema) -> Self {
        self.entries.insert(code, schema);
        self
    }

    pub fn get(&self, code: u16) -> Option<&SharedSchema> {
        self.entries.get(&code)
    }

    /// Declared status codes in declaration order.
    pub fn codes(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &SharedSchema)> + '_ {
        self.entries.iter().map(|(code, schema)| (*code, schema))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ResponseSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSchema")
            .field("codes", &self.codes().collect::<Vec<_>>())
            .finish()
    }
}
