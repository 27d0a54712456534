//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! A route table holds handlers of *different* closure types side by side,
//! so each one is hidden behind a trait object (`dyn ErasedHandler`):
//!
//! ```text
//! async fn get_user(ctx: ExtendedContext) -> Response { … }   ← user writes this
//!        ↓ Route::get("/users/{id}", get_user)
//! get_user.into_boxed_handler()                               ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_user))                               ← stored as BoxedHandler
//!        ↓
//! handler.call(ctx)  at request time                          ← one vtable dispatch
//!        ↓
//! Box::pin(async { get_user(ctx).await.into_reply() })        ← BoxFuture
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::ExtendedContext;
use crate::error::BoxError;
use crate::response::Response;

/// A heap-allocated, type-erased, `Send` future.
///
/// Also the return type of [`Schema::validate`](crate::Schema::validate), so
/// validators can be asynchronous.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: ExtendedContext) -> BoxFuture<'static, Result<Response, BoxError>>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Reply ─────────────────────────────────────────────────────────────────────

/// What a route handler may return.
///
/// A plain [`Response`] is final. `Option` and `Result` let a handler fail:
/// `None` or `Err(_)` become a generic `500`, with the cause logged.
///
/// Anything else is not a response, so a handler returning a bare string
/// does not compile; build one with `ctx.text(..)` instead.
///
/// ```compile_fail
/// fn reply<R: covenant::Reply>(_: R) {}
/// reply("hello");
/// ```
pub trait Reply {
    fn into_reply(self) -> Result<Response, BoxError>;
}

impl Reply for Response {
    fn into_reply(self) -> Result<Response, BoxError> { Ok(self) }
}

impl<T: Reply> Reply for Option<T> {
    fn into_reply(self) -> Result<Response, BoxError> {
        match self {
            Some(reply) => reply.into_reply(),
            None => Err("handler returned no response".into()),
        }
    }
}

impl<T, E> Reply for Result<T, E>
where
    T: Reply,
    E: Into<BoxError>,
{
    fn into_reply(self) -> Result<Response, BoxError> {
        self.map_err(Into::into)?.into_reply()
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Satisfied automatically by any async function or closure of the shape
///
/// ```text
/// async fn name(ctx: ExtendedContext) -> impl Reply
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(ExtendedContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Reply + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(ExtendedContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Reply + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(ExtendedContext) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: Reply + Send + 'static,
{
    fn call(&self, ctx: ExtendedContext) -> BoxFuture<'static, Result<Response, BoxError>> {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into_reply() })
    }
}
