//! Route composition.
//!
//! [`Router`] is the builder: routes, groups and middleware are registered on
//! it at startup. [`Router::build`] freezes it into a [`RouteTable`], which
//! the server shares across connections and never mutates again.
//!
//! # Resolution is eager
//!
//! Each route's chain is fixed the moment the route is registered:
//!
//! ```text
//! chain = scope middleware ++ route middleware ++ [terminal adapter]
//! ```
//!
//! so [`use_middleware`](Router::use_middleware) only affects routes
//! registered *after* it, within the same scope.
//!
//! # Groups
//!
//! A group is a child scope: its prefix is joined onto the parent's and its
//! middleware appended to a copy of the parent's list. Inside the closure the
//! router is bound to the child scope; the parent scope is restored when the
//! closure returns, so siblings never see each other's middleware.
//!
//! ```rust,no_run
//! use seed::{middleware, Context, Request, Response, Router};
//!
//! async fn list_users(_: Context, _: Request) -> Response { Response::text("[]") }
//! async fn get_user(ctx: Context, _: Request) -> Response {
//!     Response::text(ctx.param("id").unwrap_or_default().to_owned())
//! }
//!
//! let mut router = Router::new();
//! router.use_middleware(middleware::recoverer());
//! router.group("/v1", |r| {
//!     r.get("/users", list_users);
//!     r.get("/users/{id}", get_user);
//! });
//! let table = router.build();
//! ```
//!
//! # Lookup
//!
//! One radix tree per method ([`matchit`]), O(path-length). Patterns use
//! `{name}` for a segment and `{*name}` for the rest of the path.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::chain::{BoxedMiddleware, Chain, Middleware};
use crate::context::{Context, Params};
use crate::files;
use crate::handler::{BoxedHandler, Handler, Terminal};
use crate::method::Method;
use crate::middleware::CORS_HEADERS;
use crate::path;
use crate::request::Request;
use crate::response::Response;
use crate::writer::ResponseWriter;

/// Separator between method names in [`Router::handle`].
pub const DEFAULT_METHOD_SEPARATOR: &str = ",";

/// Largest request body [`RouteTable::dispatch`] reads unless
/// [`Router::max_body_size`] says otherwise: 2 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

#[derive(Clone, Default)]
struct Scope {
    prefix: String,
    middleware: Vec<BoxedMiddleware>,
}

/// The route builder. See the [module docs](self).
pub struct Router {
    trees: HashMap<Method, MatchitRouter<Chain>>,
    scope: Scope,
    separator: String,
    max_body_size: usize,
    not_found: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            scope: Scope::default(),
            separator: DEFAULT_METHOD_SEPARATOR.to_owned(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            not_found: default_not_found.into_boxed_handler(),
        }
    }

    /// Changes the separator [`handle`](Self::handle) splits method lists on.
    pub fn method_separator(&mut self, separator: impl Into<String>) -> &mut Self {
        self.separator = separator.into();
        self
    }

    /// Caps request bodies at `limit` bytes. Longer bodies get `413` before
    /// routing.
    pub fn max_body_size(&mut self, limit: usize) -> &mut Self {
        self.max_body_size = limit;
        self
    }

    /// Registers `handler` for every method in `methods` at `pattern`.
    ///
    /// `methods` is a separated list such as `"GET,POST"`, or `"ANY"` for
    /// every method.
    ///
    /// # Panics
    ///
    /// On an unknown method, an invalid pattern, or a pattern that conflicts
    /// with a route already registered for the same method.
    pub fn handle(&mut self, methods: &str, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle_with(methods, pattern, handler, Vec::new())
    }

    /// Like [`handle`](Self::handle), with extra middleware for this route
    /// only. It runs after the scope's middleware.
    pub fn handle_with(
        &mut self,
        methods: &str,
        pattern: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> &mut Self {
        let full = path::join(&self.scope.prefix, pattern);
        let methods = Method::parse_list(methods, &self.separator)
            .unwrap_or_else(|bad| panic!("invalid router method '{bad}' for path '{full}'"));

        let chain: Chain = self
            .scope
            .middleware
            .iter()
            .cloned()
            .chain(middleware)
            .chain([Terminal(handler.into_boxed_handler()).into_middleware()])
            .collect();

        for method in methods {
            self.trees
                .entry(method)
                .or_default()
                .insert(full.clone(), chain.clone())
                .unwrap_or_else(|e| panic!("cannot register {method} {full}: {e}"));
            debug!(%method, path = %full, units = chain.len(), "route registered");
        }
        self
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Get.as_str(), pattern, handler)
    }

    pub fn head(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Head.as_str(), pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Post.as_str(), pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Put.as_str(), pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Patch.as_str(), pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Delete.as_str(), pattern, handler)
    }

    pub fn options(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Options.as_str(), pattern, handler)
    }

    /// Registers `handler` for every method.
    pub fn any(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(crate::method::ANY, pattern, handler)
    }

    /// Appends `middleware` to the current scope. Routes registered earlier
    /// are not affected.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.scope.middleware.push(middleware.into_middleware());
        self
    }

    /// Registers the routes `configure` adds under `prefix`.
    pub fn group(&mut self, prefix: &str, configure: impl FnOnce(&mut Router)) -> &mut Self {
        self.group_with(prefix, configure, Vec::new())
    }

    /// Like [`group`](Self::group), with middleware that runs for every route
    /// of the group, after the parent scope's middleware.
    pub fn group_with(
        &mut self,
        prefix: &str,
        configure: impl FnOnce(&mut Router),
        middleware: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> &mut Self {
        let mut child = Scope {
            prefix: path::join(&self.scope.prefix, prefix),
            middleware: self.scope.middleware.clone(),
        };
        child.middleware.extend(middleware);

        let parent = std::mem::replace(&mut self.scope, child);
        configure(self);
        self.scope = parent;
        self
    }

    /// Replaces the handler for requests that match no route. It runs
    /// without any middleware.
    pub fn not_found(&mut self, handler: impl Handler) -> &mut Self {
        self.not_found = handler.into_boxed_handler();
        self
    }

    /// Serves the files below `root` at `{prefix}/{*filepath}` for `GET` and
    /// `HEAD`, with the current scope's middleware.
    pub fn static_files(&mut self, prefix: &str, root: impl Into<PathBuf>) -> &mut Self {
        let root = Arc::new(root.into());
        let pattern = format!("{prefix}/{{*filepath}}");
        self.handle("GET,HEAD", &pattern, move |ctx: Context, _req: Request| {
            let root = Arc::clone(&root);
            async move { files::serve(&root, ctx.param("filepath").unwrap_or_default()).await }
        })
    }

    /// Freezes the builder.
    pub fn build(self) -> RouteTable {
        RouteTable { trees: self.trees, max_body_size: self.max_body_size, not_found: self.not_found }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("prefix", &self.scope.prefix)
            .field("middleware", &self.scope.middleware.len())
            .field("methods", &self.trees.keys().collect::<Vec<_>>())
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

/// `OPTIONS` gets a `204` preflight answer with permissive CORS headers,
/// anything else a `404`.
async fn default_not_found(_: Context, req: Request) -> Response {
    if req.method() == http::Method::OPTIONS {
        return Response {
            body: Bytes::new(),
            headers: CORS_HEADERS.to_vec(),
            status: StatusCode::NO_CONTENT,
        };
    }
    Response::status(StatusCode::NOT_FOUND)
}

// ── RouteTable ────────────────────────────────────────────────────────────────

/// The immutable routing table a [`Router`] builds.
pub struct RouteTable {
    trees: HashMap<Method, MatchitRouter<Chain>>,
    max_body_size: usize,
    not_found: BoxedHandler,
}

impl RouteTable {
    /// Handles one request end to end.
    ///
    /// The body is read in full first, up to the configured size. A longer
    /// body gets a `413` and a body that fails to arrive gets a `400`; neither
    /// reaches a route. A panic that no
    /// [`Recoverer`](crate::middleware::Recoverer) catches propagates to the
    /// caller.
    pub async fn dispatch<B>(&self, req: http::Request<B>, remote_addr: Option<SocketAddr>) -> http::Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let res = ResponseWriter::new();
        let (parts, body) = req.into_parts();
        let body = match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let status = if e.is::<LengthLimitError>() {
                    debug!(limit = self.max_body_size, "request body too large");
                    StatusCode::PAYLOAD_TOO_LARGE
                } else {
                    debug!("reading request body failed: {e}");
                    StatusCode::BAD_REQUEST
                };
                Response::status(status).write_to(&res);
                return res.take_response();
            }
        };
        let req = Request::new(parts, body, remote_addr);

        match self.lookup(req.method(), req.path()) {
            Some((chain, params)) => {
                chain.run(Context::new(params), res.clone(), req).await;
            }
            None => self.not_found.call(Context::default(), req).await.write_to(&res),
        }
        res.take_response()
    }

    fn lookup(&self, method: &http::Method, path: &str) -> Option<(Chain, Params)> {
        let method: Method = method.as_str().parse().ok()?;
        let matched = self.trees.get(&method)?.at(path).ok()?;
        Some((matched.value.clone(), matched.params.iter().collect()))
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("methods", &self.trees.keys().collect::<Vec<_>>())
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}
