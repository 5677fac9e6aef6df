//! The routing façade.
//!
//! Everything outside this crate routes through [`Mux`]: plugins, the admin
//! API and the listener all see the same capability set (register, serve,
//! count) and never a tree. [`Router`] is the implementation: one routing
//! tree per virtual host plus the wildcard tree `"*"`, which answers every
//! host that has no tree of its own.
//!
//! Groups are handed out as `&dyn ScopeMux`, so a backend other than
//! [`Router`] can implement both traits.
//!
//! ```rust
//! use std::sync::Arc;
//! use hostmux::{Mux, MuxExt, Request, Router, ScopeMuxExt};
//!
//! async fn home(_req: Request) -> &'static str { "home" }
//! async fn list_apis(_req: Request) -> &'static str { "[]" }
//!
//! let router = Arc::new(Router::new());
//! router
//!     .get("*", "/", home, [])
//!     .group("api.example.com", "/apis", |r| {
//!         r.get("/", list_apis, []);
//!     });
//! assert_eq!(router.route_count(), 2);
//! ```

use http::StatusCode;
use tracing::{trace, warn};

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::host::resolve_host;
use crate::method::Method;
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;
use crate::table::HostTable;
use crate::tree::{ScopeId, Tree, ROOT};

// ── Capability traits ─────────────────────────────────────────────────────────

/// The routing capability set.
///
/// Object-safe so collaborators can hold `&dyn Mux` / `Arc<dyn Mux>`. The
/// ergonomic, generic registration methods live on [`MuxExt`], which every
/// `Mux` gets for free.
///
/// A host of `"*"` (or `""`) addresses the wildcard tree.
pub trait Mux: Send + Sync {
    /// Registers `handler` for one method. `middleware` nests inside the
    /// host's scope middleware, first element outermost.
    fn add_route(
        &self,
        host: &str,
        method: Method,
        path: &str,
        handler: BoxedHandler,
        middleware: Vec<Middleware>,
    );

    /// Registers `handler` for every method not registered explicitly.
    fn add_any(&self, host: &str, path: &str, handler: BoxedHandler, middleware: Vec<Middleware>);

    /// Creates or reuses the sub-scope `prefix` of `host` and hands it to `build`.
    fn add_group(&self, host: &str, prefix: &str, build: &mut dyn FnMut(&dyn ScopeMux));

    /// Appends middleware for routes registered on `host` from now on.
    fn add_middleware(&self, host: &str, middleware: Vec<Middleware>);

    /// Routes `req` to the tree of the host it targets.
    fn serve(&self, req: Request) -> BoxFuture;

    /// Leaf routes across every host. Diagnostics only.
    fn route_count(&self) -> usize;
}

/// Registration capabilities of one group. Paths are relative to the group
/// prefix; `"/"` is the prefix itself.
pub trait ScopeMux {
    fn add_route(
        &self,
        method: Method,
        path: &str,
        handler: BoxedHandler,
        middleware: Vec<Middleware>,
    );

    fn add_any(&self, path: &str, handler: BoxedHandler, middleware: Vec<Middleware>);

    /// Appends middleware for routes registered in this scope (and scopes
    /// nested in it) from now on.
    fn add_middleware(&self, middleware: Vec<Middleware>);

    /// Nested group; `prefix` is relative to this scope's prefix.
    fn add_group(&self, prefix: &str, build: &mut dyn FnMut(&dyn ScopeMux));
}

/// Generic registration sugar over [`Mux`].
///
/// Each method returns `&Self` so registrations chain.
pub trait MuxExt: Mux {
    /// Registers by method name. Only the nine RFC 9110 methods are routable;
    /// any other name registers nothing and logs a warning.
    fn handle(
        &self,
        host: &str,
        method: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        match method.parse::<Method>() {
            Ok(method) => self.route(host, method, path, handler, middleware),
            Err(e) => {
                warn!(host, path, "route ignored: {e}");
                self
            }
        }
    }

    fn route(
        &self,
        host: &str,
        method: Method,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        let middleware = middleware.into_iter().collect();
        self.add_route(host, method, path, handler.into_boxed_handler(), middleware);
        self
    }

    /// Registers for every method; an explicit method registration on the
    /// same path takes precedence.
    fn any(
        &self,
        host: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.add_any(host, path, handler.into_boxed_handler(), middleware.into_iter().collect());
        self
    }

    fn get(
        &self,
        host: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(host, Method::Get, path, handler, middleware)
    }

    fn post(
        &self,
        host: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(host, Method::Post, path, handler, middleware)
    }

    fn put(
        &self,
        host: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(host, Method::Put, path, handler, middleware)
    }

    fn patch(
        &self,
        host: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(host, Method::Patch, path, handler, middleware)
    }

    fn delete(
        &self,
        host: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(host, Method::Delete, path, handler, middleware)
    }

    fn head(
        &self,
        host: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(host, Method::Head, path, handler, middleware)
    }

    fn options(
        &self,
        host: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(host, Method::Options, path, handler, middleware)
    }

    fn trace(
        &self,
        host: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(host, Method::Trace, path, handler, middleware)
    }

    fn connect(
        &self,
        host: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(host, Method::Connect, path, handler, middleware)
    }

    /// Runs `build` against the `prefix` sub-scope of `host`. Routes and
    /// middleware registered through the scope apply only under `prefix`.
    fn group(&self, host: &str, prefix: &str, build: impl FnOnce(&dyn ScopeMux)) -> &Self {
        let mut build = Some(build);
        self.add_group(host, prefix, &mut |scope: &dyn ScopeMux| {
            if let Some(build) = build.take() {
                build(scope);
            }
        });
        self
    }

    /// Appends scope middleware to `host`. Not retroactive.
    fn use_middleware(
        &self,
        host: &str,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.add_middleware(host, middleware.into_iter().collect());
        self
    }
}

impl<M: Mux + ?Sized> MuxExt for M {}

/// Generic registration sugar over [`ScopeMux`], the group-relative
/// counterpart of [`MuxExt`].
pub trait ScopeMuxExt: ScopeMux {
    fn handle(
        &self,
        method: &str,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        match method.parse::<Method>() {
            Ok(method) => self.route(method, path, handler, middleware),
            Err(e) => {
                warn!(path, "route ignored: {e}");
                self
            }
        }
    }

    fn route(
        &self,
        method: Method,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        let middleware = middleware.into_iter().collect();
        self.add_route(method, path, handler.into_boxed_handler(), middleware);
        self
    }

    fn any(
        &self,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.add_any(path, handler.into_boxed_handler(), middleware.into_iter().collect());
        self
    }

    fn get(
        &self,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(Method::Get, path, handler, middleware)
    }

    fn post(
        &self,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(Method::Post, path, handler, middleware)
    }

    fn put(
        &self,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(Method::Put, path, handler, middleware)
    }

    fn patch(
        &self,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(Method::Patch, path, handler, middleware)
    }

    fn delete(
        &self,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(Method::Delete, path, handler, middleware)
    }

    fn head(
        &self,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(Method::Head, path, handler, middleware)
    }

    fn options(
        &self,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(Method::Options, path, handler, middleware)
    }

    fn trace(
        &self,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(Method::Trace, path, handler, middleware)
    }

    fn connect(
        &self,
        path: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> &Self {
        self.route(Method::Connect, path, handler, middleware)
    }

    fn use_middleware(&self, middleware: impl IntoIterator<Item = Middleware>) -> &Self {
        self.add_middleware(middleware.into_iter().collect());
        self
    }

    fn group(&self, prefix: &str, build: impl FnOnce(&dyn ScopeMux)) -> &Self {
        let mut build = Some(build);
        self.add_group(prefix, &mut |scope: &dyn ScopeMux| {
            if let Some(build) = build.take() {
                build(scope);
            }
        });
        self
    }
}

impl<S: ScopeMux + ?Sized> ScopeMuxExt for S {}

/// Something that contributes routes: a plugin, the admin API, a health
/// endpoint set. Receives the façade explicitly instead of reaching for a
/// global router.
pub trait Routes {
    fn register(&self, mux: &dyn Mux);
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// [`Router`]'s group handle: one scope inside one host's tree.
struct Scope<'a> {
    tree: &'a Tree,
    id: ScopeId,
}

impl ScopeMux for Scope<'_> {
    fn add_route(
        &self,
        method: Method,
        path: &str,
        handler: BoxedHandler,
        middleware: Vec<Middleware>,
    ) {
        self.tree.route(self.id, Some(method), path, handler, &middleware);
    }

    fn add_any(&self, path: &str, handler: BoxedHandler, middleware: Vec<Middleware>) {
        self.tree.route(self.id, None, path, handler, &middleware);
    }

    fn add_middleware(&self, middleware: Vec<Middleware>) {
        self.tree.use_middleware(self.id, &middleware);
    }

    fn add_group(&self, prefix: &str, build: &mut dyn FnMut(&dyn ScopeMux)) {
        let nested = Scope { tree: self.tree, id: self.tree.group(self.id, prefix) };
        build(&nested);
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Construction options for [`Router`].
pub struct RouterOptions {
    /// Answers requests no route matches, on every host.
    pub not_found: BoxedHandler,
}

impl RouterOptions {
    pub fn not_found(mut self, handler: impl Handler) -> Self {
        self.not_found = handler.into_boxed_handler();
        self
    }
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self { not_found: not_found.into_boxed_handler() }
    }
}

/// The default not-found handler: `404` with a plain-text body.
pub async fn not_found(_req: Request) -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .text("404 page not found\n")
}

/// Virtual-host routing multiplexer.
///
/// Share it behind an `Arc`: registration takes `&self`, so routes can be
/// added while the server is already serving. A route becomes visible to
/// every request dispatched after its registration call returns.
pub struct Router {
    table: HostTable,
}

impl Router {
    pub fn new() -> Self {
        Self::with_options(RouterOptions::default())
    }

    pub fn with_options(options: RouterOptions) -> Self {
        Self { table: HostTable::new(options.not_found) }
    }

    /// Lets `routes` register itself. Returns `self` for chaining.
    pub fn install(&self, routes: &dyn Routes) -> &Self {
        routes.register(self);
        self
    }

    /// Host keys that own a tree, `"*"` first.
    pub fn hosts(&self) -> Vec<String> {
        self.table.hosts()
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl Mux for Router {
    fn add_route(
        &self,
        host: &str,
        method: Method,
        path: &str,
        handler: BoxedHandler,
        middleware: Vec<Middleware>,
    ) {
        self.table
            .get_or_create(host)
            .route(ROOT, Some(method), path, handler, &middleware);
    }

    fn add_any(&self, host: &str, path: &str, handler: BoxedHandler, middleware: Vec<Middleware>) {
        self.table.get_or_create(host).route(ROOT, None, path, handler, &middleware);
    }

    fn add_group(&self, host: &str, prefix: &str, build: &mut dyn FnMut(&dyn ScopeMux)) {
        let tree = self.table.get_or_create(host);
        let scope = Scope { tree: &tree, id: tree.group(ROOT, prefix) };
        build(&scope);
    }

    fn add_middleware(&self, host: &str, middleware: Vec<Middleware>) {
        self.table.get_or_create(host).use_middleware(ROOT, &middleware);
    }

    fn serve(&self, req: Request) -> BoxFuture {
        let host = resolve_host(&req);
        let tree = self.table.lookup(host);
        trace!(host, path = req.path(), "dispatching");
        tree.dispatch(req)
    }

    fn route_count(&self) -> usize {
        self.table.route_count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use super::*;
    use crate::middleware::{from_fn, Next};

    fn request(method: http::Method, host: &str, path: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(path)
            .header("host", host)
            .body(Bytes::new())
            .unwrap()
            .into()
    }

    async fn body(router: &Router, host: &str, path: &str) -> String {
        let res = router.serve(request(http::Method::GET, host, path)).await;
        String::from_utf8_lossy(res.body()).into_owned()
    }

    fn tag(label: &'static str) -> Middleware {
        from_fn(move |req: Request, next: Next| async move {
            let inner = next.run(req).await;
            Response::text(format!("{label}({})", String::from_utf8_lossy(inner.body())))
        })
    }

    #[tokio::test]
    async fn handle_dispatches_every_supported_method() {
        let router = Router::new();
        for method in Method::ALL {
            router.handle("*", method.as_str(), "/m", move |_req: Request| async move {
                method.as_str()
            }, []);
        }

        for method in Method::ALL {
            let http_method = http::Method::from_bytes(method.as_str().as_bytes()).unwrap();
            let res = router.serve(request(http_method, "x.test", "/m")).await;
            assert_eq!(res.body(), method.as_str().as_bytes());
        }
        assert_eq!(router.route_count(), 1);
    }

    #[tokio::test]
    async fn handle_ignores_unsupported_methods() {
        let router = Router::new();
        router.handle("*", "PURGE", "/cache", |_req: Request| async { "purged" }, []);
        router.handle("api.test", "get", "/lower", |_req: Request| async { "never" }, []);

        assert_eq!(router.route_count(), 0);
        let res = router.serve(request(http::Method::GET, "x.test", "/cache")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn host_specific_tree_shadows_wildcard() {
        let router = Router::new();
        router
            .get("*", "/", |_req: Request| async { "default" }, [])
            .get("api.example.com", "/", |_req: Request| async { "api" }, []);

        assert_eq!(body(&router, "api.example.com", "/").await, "api");
        assert_eq!(body(&router, "other.example.com", "/").await, "default");
    }

    #[tokio::test]
    async fn host_tree_does_not_fall_through_per_path() {
        let router = Router::new();
        router
            .get("*", "/shared", |_req: Request| async { "default" }, [])
            .get("api.example.com", "/only-api", |_req: Request| async { "api" }, []);

        let res = router.serve(request(http::Method::GET, "api.example.com", "/shared")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body(), b"404 page not found\n");
    }

    #[tokio::test]
    async fn custom_not_found_applies_to_every_host() {
        let options = RouterOptions::default()
            .not_found(|_req: Request| async { StatusCode::GONE });
        let router = Router::with_options(options);
        router.get("api.test", "/x", |_req: Request| async { "x" }, []);

        let api = router.serve(request(http::Method::GET, "api.test", "/missing")).await;
        let other = router.serve(request(http::Method::GET, "other.test", "/missing")).await;
        assert_eq!(api.status_code(), StatusCode::GONE);
        assert_eq!(other.status_code(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn group_scopes_middleware_to_prefix() {
        let router = Router::new();
        router
            .use_middleware("*", [tag("log")])
            .get("*", "/login", |_req: Request| async { "login" }, [])
            .group("*", "/apis", |r| {
                r.use_middleware([tag("jwt")]);
                r.get("/", |_req: Request| async { "list" }, []);
                r.get("/{name}", |req: Request| async move {
                    req.param("name").unwrap_or_default().to_owned()
                }, [tag("route")]);
            });

        assert_eq!(body(&router, "x", "/login").await, "log(login)");
        assert_eq!(body(&router, "x", "/apis").await, "log(jwt(list))");
        assert_eq!(body(&router, "x", "/apis/users").await, "log(jwt(route(users)))");
    }

    #[tokio::test]
    async fn group_index_matches_prefix_with_trailing_slash() {
        let router = Router::new();
        router.group("*", "/apis", |r| {
            r.get("/", |_req: Request| async { "list" }, []);
        });

        let bare = router.serve(request(http::Method::GET, "x", "/apis")).await;
        let slash = router.serve(request(http::Method::GET, "x", "/apis/")).await;
        assert_eq!(bare.status_code(), StatusCode::OK);
        assert_eq!(slash.status_code(), StatusCode::OK);
        assert_eq!(slash.body(), b"list");
        assert_eq!(router.route_count(), 1);
    }

    #[test]
    fn middleware_constructor_can_use_the_router() {
        let router = Arc::new(Router::new());
        let counted = Arc::new(AtomicUsize::new(usize::MAX));
        let reentrant = {
            let router = Arc::clone(&router);
            let counted = Arc::clone(&counted);
            Middleware::new(move |next: BoxedHandler| -> BoxedHandler {
                counted.store(router.route_count(), Ordering::SeqCst);
                router.get("*", "/sibling", |_req: Request| async { "sibling" }, []);
                next
            })
        };

        router.get("*", "/x", |_req: Request| async { "x" }, [reentrant]);

        assert_eq!(counted.load(Ordering::SeqCst), 0);
        assert_eq!(router.route_count(), 2);
    }

    #[tokio::test]
    async fn group_is_reused_across_calls() {
        let router = Router::new();
        router.group("*", "/auth", |r| {
            r.use_middleware([tag("guard")]);
        });
        router.group("*", "/auth", |r| {
            r.get("/refresh_token", |_req: Request| async { "token" }, []);
        });

        assert_eq!(body(&router, "x", "/auth/refresh_token").await, "guard(token)");
    }

    #[tokio::test]
    async fn nested_groups_join_prefixes() {
        let router = Router::new();
        router.group("*", "/credentials", |r| {
            r.group("/basic_auth", |r| {
                r.get("/{username}", |req: Request| async move {
                    req.param("username").unwrap_or_default().to_owned()
                }, []);
            });
        });

        assert_eq!(body(&router, "x", "/credentials/basic_auth/alice").await, "alice");
    }

    #[tokio::test]
    async fn any_serves_all_methods() {
        let router = Router::new();
        router.any("*", "/metrics", |_req: Request| async { "metrics" }, []);

        for method in [http::Method::GET, http::Method::POST, http::Method::DELETE] {
            let res = router.serve(request(method, "x", "/metrics")).await;
            assert_eq!(res.body(), b"metrics");
        }
    }

    struct Health;

    impl Routes for Health {
        fn register(&self, mux: &dyn Mux) {
            mux.get("*", "/healthz", |_req: Request| async { "ok" }, []);
        }
    }

    #[tokio::test]
    async fn install_hands_the_mux_to_providers() {
        let router = Router::new();
        router.install(&Health);

        assert_eq!(body(&router, "x", "/healthz").await, "ok");
        assert_eq!(router.hosts(), vec!["*".to_owned()]);
    }

    #[tokio::test]
    async fn works_through_a_trait_object() {
        let mux: Arc<dyn Mux> = Arc::new(Router::new());
        mux.post("api.test", "/login", |_req: Request| async { "in" }, []);

        let res = mux.serve(request(http::Method::POST, "api.test", "/login")).await;
        assert_eq!(res.body(), b"in");
        assert_eq!(mux.route_count(), 1);
    }
}
