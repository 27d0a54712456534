//! Error types and the error-to-response policy.
//!
//! Two families live here:
//!
//! - [`Error`]: infrastructure and registration failures (binding a port,
//!   an unparsable route path, a schema document that does not compile).
//!   These surface as `Result`s at startup.
//! - [`PipelineError`]: failures the request pipeline classifies while
//!   serving: rejected input (`400`) or a server-side fault (`500`). They
//!   never escape the pipeline; they are turned into a [`Response`] on the
//!   spot, optionally through a user-supplied [`ErrorHook`].

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::json;
use tracing::{error, warn};

use crate::response::Response;
use crate::schema::Field;

/// Boxed error returned by user middleware and handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by covenant's fallible startup operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid route `{path}`: {reason}")]
    Route { path: String, reason: String },

    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("invalid socket address `{0}`")]
    Addr(String),

    #[error("cannot serialize the API document: {0}")]
    Document(#[source] serde_json::Error),
}

// ── Pipeline errors ───────────────────────────────────────────────────────────

/// Classification of a pipeline failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Malformed or schema-rejected input.
    Validation,
    /// Middleware/handler failure, missing reply, or a response that does not
    /// satisfy its declared schema.
    InternalServer,
}

impl ErrorKind {
    pub fn default_status(self) -> u16 {
        match self {
            Self::Validation     => 400,
            Self::InternalServer => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validation     => "ValidationError",
            Self::InternalServer => "InternalServerError",
        })
    }
}

/// A failure classified by the request pipeline.
///
/// For [`ErrorKind::Validation`] the message is client-facing. For
/// [`ErrorKind::InternalServer`] it describes the real cause and is only
/// logged; clients receive the configured generic message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
    field: Option<Field>,
    status: Option<u16>,
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Validation, message: message.into(), field: None, status: None }
    }

    pub fn internal(cause: impl Into<String>) -> Self {
        Self { kind: ErrorKind::InternalServer, message: cause.into(), field: None, status: None }
    }

    /// Tags the error with the request/response field it concerns.
    pub fn at(mut self, field: Field) -> Self {
        self.field = Some(field);
        self
    }

    /// Overrides the status code derived from the kind.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kind(&self) -> ErrorKind { self.kind }
    pub fn message(&self) -> &str { &self.message }
    pub fn field(&self) -> Option<Field> { self.field }

    pub fn status(&self) -> u16 {
        self.status.unwrap_or_else(|| self.kind.default_status())
    }
}

// ── Error policy ──────────────────────────────────────────────────────────────

/// Process-wide hook consulted for every [`PipelineError`].
///
/// Return `Some(response)` to replace the default `{"message": ..}` body.
/// `None`, a panic, or a response with a status outside `100..=599` all fall
/// back to the default rendering.
pub type ErrorHook = Arc<dyn Fn(&PipelineError) -> Option<Response> + Send + Sync + 'static>;

pub(crate) const DEFAULT_INTERNAL_MESSAGE: &str = "Internal server error";

/// Turns pipeline errors into responses. Shared by every route of an app.
#[derive(Clone)]
pub(crate) struct ErrorPolicy {
    hook: Option<ErrorHook>,
    internal_message: Arc<str>,
}

impl ErrorPolicy {
    pub(crate) fn new(hook: Option<ErrorHook>, internal_message: &str) -> Self {
        Self { hook, internal_message: Arc::from(internal_message) }
    }

    pub(crate) fn respond(&self, err: &PipelineError) -> Response {
        match err.kind() {
            ErrorKind::Validation => warn!(field = ?err.field(), "rejected: {}", err.message()),
            ErrorKind::InternalServer => error!(field = ?err.field(), "internal error: {}", err.message()),
        }

        if let Some(hook) = &self.hook {
            match catch_unwind(AssertUnwindSafe(|| hook(err))) {
                Ok(Some(res)) if res.has_valid_status() => return res,
                Ok(Some(res)) => warn!(status = res.status(), "error hook returned an invalid status, using default"),
                Ok(None) => {}
                Err(panic) => error!("error hook panicked: {}", panic_message(panic.as_ref())),
            }
        }

        self.default_response(err)
    }

    fn default_response(&self, err: &PipelineError) -> Response {
        let message = match err.kind() {
            ErrorKind::Validation => err.message(),
            ErrorKind::InternalServer => &*self.internal_message,
        };
        let body = json!({ "message": message }).to_string().into_bytes();
        Response::builder().status(err.status()).json(body)
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::new(None, DEFAULT_INTERNAL_MESSAGE)
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(res: &Response) -> serde_json::Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[test]
    fn document_error_keeps_its_cause() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::Document(cause);

        assert!(err.to_string().starts_with("cannot serialize the API document: "));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn validation_message_reaches_the_client() {
        let err = PipelineError::validation("id: bad").at(Field::Params);
        let res = ErrorPolicy::default().respond(&err);

        assert_eq!(res.status(), 400);
        assert_eq!(body(&res), json!({ "message": "id: bad" }));
    }

    #[test]
    fn internal_cause_is_not_leaked() {
        let err = PipelineError::internal("db password rejected");
        let res = ErrorPolicy::default().respond(&err);

        assert_eq!(res.status(), 500);
        assert_eq!(body(&res), json!({ "message": "Internal server error" }));
    }

    #[test]
    fn explicit_status_wins() {
        let err = PipelineError::validation("too large").with_status(413);
        assert_eq!(ErrorPolicy::default().respond(&err).status(), 413);
    }

    #[test]
    fn configured_internal_message() {
        let policy = ErrorPolicy::new(None, "oops");
        let res = policy.respond(&PipelineError::internal("boom"));
        assert_eq!(body(&res), json!({ "message": "oops" }));
    }

    #[test]
    fn hook_response_is_used() {
        let hook: ErrorHook = Arc::new(|err| {
            Some(Response::builder().status(err.status()).text(err.kind().to_string()))
        });
        let res = ErrorPolicy::new(Some(hook), DEFAULT_INTERNAL_MESSAGE)
            .respond(&PipelineError::validation("nope"));

        assert_eq!(res.status(), 400);
        assert_eq!(res.body(), b"ValidationError");
    }

    #[test]
    fn failing_hook_falls_back_to_default() {
        let panicking: ErrorHook = Arc::new(|_| panic!("hook exploded"));
        let declining: ErrorHook = Arc::new(|_| None);
        let invalid: ErrorHook = Arc::new(|_| Some(Response::empty(1000)));

        for hook in [panicking, declining, invalid] {
            let res = ErrorPolicy::new(Some(hook), DEFAULT_INTERNAL_MESSAGE)
                .respond(&PipelineError::internal("boom"));
            assert_eq!(res.status(), 500);
            assert_eq!(body(&res), json!({ "message": "Internal server error" }));
        }
    }
}
