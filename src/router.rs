//! Route registration and the dispatch table.
//!
//! [`Router`] is an append-only builder used at startup. [`Router::build`]
//! resolves every route once (prefix, middleware order, merged contracts,
//! transport path) into an immutable [`App`]. Nothing changes after that, so
//! concurrent requests share the table without locks.
//!
//! Lookup is one radix tree per HTTP method via [`matchit`]; declared
//! `{name}` placeholders are translated into matchit's `:name` syntax at
//! registration and back when the API document is generated.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use matchit::Router as MatchitRouter;
use serde_json::json;
use tracing::{Instrument, debug, debug_span};

use crate::error::{DEFAULT_INTERNAL_MESSAGE, Error, ErrorHook, ErrorPolicy, PipelineError};
use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::middleware::Middleware;
use crate::openapi::{self, Info, OpenApi};
use crate::request::Request;
use crate::response::Response;
use crate::route::{Route, RouteDoc};
use crate::schema::{RequestSchema, ResponseSchema, merge_request, merge_response};

// ── Router (builder) ──────────────────────────────────────────────────────────

/// The application builder.
///
/// ```rust,no_run
/// use covenant::{ExtendedContext, JsonSchema, Route, Router};
/// use serde_json::json;
///
/// # fn build() -> Result<covenant::App, covenant::Error> {
/// let app = Router::new()
///     .prefix("/api")
///     .route(
///         Route::get("/health", |ctx: ExtendedContext| async move {
///             ctx.json(200, json!({ "ok": true })).await
///         })
///         .response(200, JsonSchema::new(json!({ "type": "object" }))?),
///     )
///     .openapi_at("/openapi.json")
///     .build()?;
/// # Ok(app)
/// # }
/// ```
pub struct Router {
    prefix: String,
    middleware: Vec<Arc<Middleware>>,
    routes: Vec<Route>,
    hook: Option<ErrorHook>,
    internal_message: String,
    info: Info,
    docs_path: Option<String>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            middleware: Vec::new(),
            routes: Vec::new(),
            hook: None,
            internal_message: DEFAULT_INTERNAL_MESSAGE.to_owned(),
            info: Info::default(),
            docs_path: None,
        }
    }

    /// Path prefix prepended to every route of this router.
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_owned();
        self
    }

    /// Adds a process-wide middleware. Process-wide middleware run before any
    /// route-specific one, in the order they were added.
    pub fn with(mut self, middleware: impl Into<Arc<Middleware>>) -> Self {
        self.middleware.push(middleware.into());
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Installs the process-wide error hook. See [`ErrorHook`].
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PipelineError) -> Option<Response> + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Message sent to clients for every internal error.
    pub fn internal_error_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = message.into();
        self
    }

    /// Metadata for the generated API document.
    pub fn info(mut self, info: Info) -> Self {
        self.info = info;
        self
    }

    /// Serves the generated API document as JSON at `path` (`GET` only).
    pub fn openapi_at(mut self, path: &str) -> Self {
        self.docs_path = Some(path.to_owned());
        self
    }

    /// Resolves every route and freezes the table.
    pub fn build(self) -> Result<App, Error> {
        let mut trees: HashMap<Method, MatchitRouter<Arc<InternalRoute>>> = HashMap::new();
        let mut routes = Vec::with_capacity(self.routes.len());

        for route in self.routes {
            let internal = Arc::new(InternalRoute::resolve(&self.prefix, &self.middleware, route)?);
            trees
                .entry(internal.method)
                .or_insert_with(MatchitRouter::new)
                .insert(internal.path.clone(), Arc::clone(&internal))
                .map_err(|e| Error::Route { path: internal.template(), reason: e.to_string() })?;
            debug!(method = %internal.method, path = %internal.template(), "route registered");
            routes.push(internal);
        }

        let openapi = openapi::generate(&self.info, &routes);
        let docs = match self.docs_path {
            Some(path) => {
                let path = join_path(&self.prefix, &path);
                if trees.get(&Method::Get).is_some_and(|tree| tree.at(&path).is_ok()) {
                    return Err(Error::Route { path, reason: "conflicts with the API document path".to_owned() });
                }
                let body = serde_json::to_vec(&openapi).map_err(Error::Document)?;
                Some((path, body))
            }
            None => None,
        };

        Ok(App {
            routes,
            trees,
            errors: ErrorPolicy::new(self.hook, &self.internal_message),
            openapi,
            docs,
        })
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

// ── InternalRoute ─────────────────────────────────────────────────────────────

/// A route resolved for dispatch: transport path, middleware in run order,
/// and the effective (merged) contracts.
pub struct InternalRoute {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) doc: RouteDoc,
    pub(crate) own_request: RequestSchema,
    pub(crate) request: RequestSchema,
    pub(crate) responses: Arc<ResponseSchema>,
    pub(crate) middleware: Vec<Arc<Middleware>>,
    pub(crate) handler: BoxedHandler,
}

impl InternalRoute {
    fn resolve(prefix: &str, global: &[Arc<Middleware>], route: Route) -> Result<Self, Error> {
        let template = join_path(prefix, &route.path);
        if route.responses.is_empty() {
            return Err(Error::Route { path: template, reason: "no response schema declared".to_owned() });
        }

        let middleware: Vec<Arc<Middleware>> = global.iter()
            .chain(route.middleware.iter())
            .cloned()
            .collect();

        let request = merge_request(
            middleware.iter().map(|m| m.request_schema())
                .chain(std::iter::once(route.request.as_ref())),
        );
        let responses = merge_response(
            middleware.iter().map(|m| m.response_schema())
                .chain(std::iter::once(Some(&route.responses))),
        );

        Ok(Self {
            method: route.method,
            path: to_transport(&template),
            doc: route.doc,
            own_request: route.request.unwrap_or_default(),
            request,
            responses: Arc::new(responses),
            middleware,
            handler: route.handler,
        })
    }

    pub fn method(&self) -> Method { self.method }

    /// Path in the transport's placeholder syntax (`/users/:id`).
    pub fn path(&self) -> &str { &self.path }

    /// Path in declaration syntax (`/users/{id}`), prefix included.
    pub fn template(&self) -> String { to_template(&self.path) }

    pub fn doc(&self) -> &RouteDoc { &self.doc }

    /// Effective request contract: every middleware's, then the route's own.
    pub fn request_schema(&self) -> &RequestSchema { &self.request }

    /// Effective response contract.
    pub fn response_schema(&self) -> &ResponseSchema { &self.responses }

    /// Middleware in run order.
    pub fn middleware(&self) -> impl Iterator<Item = &Middleware> + '_ {
        self.middleware.iter().map(|m| m.as_ref())
    }
}

impl fmt::Debug for InternalRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("request", &self.request)
            .field("responses", &self.responses)
            .field("middleware", &self.middleware().map(Middleware::name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

/// The frozen route table. Hand it to [`Server::serve`](crate::Server::serve)
/// or call [`App::handle`] from any other transport.
pub struct App {
    routes: Vec<Arc<InternalRoute>>,
    trees: HashMap<Method, MatchitRouter<Arc<InternalRoute>>>,
    errors: ErrorPolicy,
    openapi: OpenApi,
    docs: Option<(String, Vec<u8>)>,
}

impl App {
    /// Runs one request through its route's pipeline. Unmatched requests
    /// get `404 {"message":"Not found"}`.
    pub async fn handle(&self, req: Request) -> Response {
        let span = debug_span!("request", method = %req.method(), path = %req.path());
        self.dispatch(req).instrument(span).await
    }

    async fn dispatch(&self, mut req: Request) -> Response {
        if let Some((path, body)) = &self.docs {
            if req.method() == Method::Get && req.path() == path {
                return Response::builder().json(body.clone());
            }
        }

        match self.lookup(req.method(), req.path()) {
            Some((route, params)) => {
                req.params = params;
                route.run(req, &self.errors).await
            }
            None => {
                debug!("no route matched");
                not_found()
            }
        }
    }

    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(Arc<InternalRoute>, HashMap<String, String>)> {
        let tree = self.trees.get(&method)?;
        let matched = tree.at(path).ok()?;
        let route = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((route, params))
    }

    /// Resolved routes, in registration order.
    pub fn routes(&self) -> &[Arc<InternalRoute>] {
        &self.routes
    }

    /// The API document derived from the registered routes.
    pub fn openapi(&self) -> &OpenApi {
        &self.openapi
    }
}

fn not_found() -> Response {
    let body = json!({ "message": "Not found" }).to_string().into_bytes();
    Response::builder().status(404).json(body)
}

// ── Paths ─────────────────────────────────────────────────────────────────────

fn join_path(prefix: &str, path: &str) -> String {
    let joined = format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/'),
    );
    if joined.starts_with('/') { joined } else { format!("/{joined}") }
}

/// `{id}` → `:id`, `{*rest}` → `*rest`. Only whole segments are placeholders.
pub(crate) fn to_transport(template: &str) -> String {
    template
        .split('/')
        .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => match name.strip_prefix('*') {
                Some(rest) => format!("*{rest}"),
                None => format!(":{name}"),
            },
            None => segment.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`to_transport`].
pub(crate) fn to_template(transport: &str) -> String {
    transport
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else if let Some(rest) = segment.strip_prefix('*') {
                format!("{{*{rest}}}")
            } else {
                segment.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
