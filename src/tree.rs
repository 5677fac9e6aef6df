//! Per-host routing tree.
//!
//! One radix tree (via [`matchit`]) maps a path pattern to an endpoint slot;
//! the slot holds one handler per method plus an optional any-method handler.
//! Keeping the handlers in slots rather than in the radix tree itself lets a
//! re-registration replace a handler in place: last writer wins, no conflict.
//!
//! Groups are scopes in an arena. A scope owns a path prefix and a middleware
//! stack; routes are flattened into the single radix tree under their full
//! path, and each endpoint remembers which scope registered it so counting
//! can walk the scope hierarchy.
//!
//! All state sits behind one `RwLock`. Dispatch holds the read lock only long
//! enough to clone the matched handler. Registration composes middleware with
//! no lock held and takes the write lock only to store the result.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use http::StatusCode;
use matchit::Router as MatchitRouter;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::handler::{BoxFuture, BoxedHandler};
use crate::method::Method;
use crate::middleware::{self, Middleware};
use crate::request::Request;
use crate::response::Response;

pub(crate) type ScopeId = usize;

/// The scope every tree starts with; prefix `""`.
pub(crate) const ROOT: ScopeId = 0;

pub(crate) struct Tree {
    host: String,
    state: RwLock<TreeState>,
    not_found: BoxedHandler,
}

struct TreeState {
    matcher: MatchitRouter<usize>,
    index: HashMap<String, usize>,
    endpoints: Vec<Endpoint>,
    scopes: Vec<ScopeState>,
}

struct Endpoint {
    scope: ScopeId,
    any: Option<BoxedHandler>,
    methods: BTreeMap<Method, BoxedHandler>,
}

struct ScopeState {
    prefix: String,
    parent: Option<ScopeId>,
    middleware: Vec<Middleware>,
    children: HashMap<String, ScopeId>,
    /// Endpoints this scope registered last.
    routes: usize,
}

enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    MethodNotAllowed(String),
    NotFound,
}

impl Tree {
    pub(crate) fn new(host: impl Into<String>, not_found: BoxedHandler) -> Self {
        Self {
            host: host.into(),
            state: RwLock::new(TreeState {
                matcher: MatchitRouter::new(),
                index: HashMap::new(),
                endpoints: Vec::new(),
                scopes: vec![ScopeState::new(String::new(), None)],
            }),
            not_found,
        }
    }

    /// Registers `handler` for `method` (`None` = every method) at `path`
    /// inside `scope`.
    ///
    /// The scope lineage's middleware, root first, wraps outermost; `middleware`
    /// nests inside it. Patterns the radix tree rejects are logged and skipped.
    /// A route at a group's own prefix also answers the prefix with a trailing
    /// slash, unless that path has a route of its own.
    pub(crate) fn route(
        &self,
        scope: ScopeId,
        method: Option<Method>,
        path: &str,
        handler: BoxedHandler,
        middleware: &[Middleware],
    ) {
        let (pattern, chain) = {
            let state = self.state.read();
            let pattern = join(&state.scopes[scope].prefix, path);
            let chain: Vec<Middleware> = state
                .lineage(scope)
                .into_iter()
                .flat_map(|id| state.scopes[id].middleware.iter().cloned())
                .chain(middleware.iter().cloned())
                .collect();
            (pattern, chain)
        };
        // Constructors run caller code, which may call back into this tree.
        let handler = middleware::compose(handler, chain.iter());

        let mut guard = self.state.write();
        let state = &mut *guard;

        let slot = match state.index.get(&pattern) {
            Some(&slot) => slot,
            None => {
                let slot = state.endpoints.len();
                if let Err(e) = state.matcher.insert(pattern.clone(), slot) {
                    error!(host = %self.host, %pattern, "route rejected: {e}");
                    return;
                }
                state.endpoints.push(Endpoint {
                    scope,
                    any: None,
                    methods: BTreeMap::new(),
                });
                state.scopes[scope].routes += 1;
                state.index.insert(pattern.clone(), slot);
                slot
            }
        };
        if scope != ROOT && pattern == state.scopes[scope].prefix {
            state.alias_trailing_slash(&pattern, slot);
        }

        let endpoint = &mut state.endpoints[slot];
        if endpoint.scope != scope {
            state.scopes[endpoint.scope].routes -= 1;
            state.scopes[scope].routes += 1;
            endpoint.scope = scope;
        }
        match method {
            Some(method) => {
                endpoint.methods.insert(method, handler);
            }
            None => endpoint.any = Some(handler),
        }

        debug!(
            host = %self.host,
            method = method.map_or("*", Method::as_str),
            %pattern,
            "route registered"
        );
    }

    /// Appends to `scope`'s middleware stack. Routes already registered keep
    /// the chain they were composed with.
    pub(crate) fn use_middleware(&self, scope: ScopeId, middleware: &[Middleware]) {
        self.state.write().scopes[scope].middleware.extend_from_slice(middleware);
    }

    /// Returns the child of `parent` for `prefix`, creating it on first use.
    pub(crate) fn group(&self, parent: ScopeId, prefix: &str) -> ScopeId {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let full = join(&state.scopes[parent].prefix, prefix)
            .trim_end_matches('/')
            .to_owned();
        if let Some(&id) = state.scopes[parent].children.get(&full) {
            return id;
        }

        let id = state.scopes.len();
        debug!(host = %self.host, prefix = %full, "group created");
        state.scopes.push(ScopeState::new(full.clone(), Some(parent)));
        state.scopes[parent].children.insert(full, id);
        id
    }

    /// Leaf routes (distinct path patterns) across every scope.
    pub(crate) fn route_count(&self) -> usize {
        self.state.read().count(ROOT)
    }

    pub(crate) fn dispatch(&self, mut req: Request) -> BoxFuture {
        let lookup = self.lookup(&req);

        match lookup {
            Lookup::Found(handler, params) => {
                req.set_params(params);
                handler.call(req)
            }
            Lookup::MethodNotAllowed(allow) => {
                let res = Response::builder()
                    .status(StatusCode::METHOD_NOT_ALLOWED)
                    .header("allow", &allow)
                    .no_body();
                Box::pin(async move { res })
            }
            Lookup::NotFound => self.not_found.call(req),
        }
    }

    fn lookup(&self, req: &Request) -> Lookup {
        let method = Method::try_from(req.method()).ok();
        let state = self.state.read();

        let Ok(matched) = state.matcher.at(req.path()) else {
            return Lookup::NotFound;
        };
        let endpoint = &state.endpoints[*matched.value];

        let handler = method
            .and_then(|m| endpoint.methods.get(&m))
            .or(endpoint.any.as_ref());
        match handler {
            Some(handler) => {
                let params = matched.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                Lookup::Found(Arc::clone(handler), params)
            }
            None => Lookup::MethodNotAllowed(endpoint.allow()),
        }
    }
}

impl TreeState {
    /// Scope ids from the root down to `scope`, inclusive.
    fn lineage(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut ids = vec![scope];
        let mut cursor = self.scopes[scope].parent;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.scopes[id].parent;
        }
        ids.reverse();
        ids
    }

    /// Points `pattern/` at `slot` as well. An existing route on that path
    /// keeps it.
    fn alias_trailing_slash(&mut self, pattern: &str, slot: usize) {
        let alias = format!("{pattern}/");
        if self.index.contains_key(&alias) {
            return;
        }
        match self.matcher.insert(alias.clone(), slot) {
            Ok(()) => {
                self.index.insert(alias, slot);
            }
            Err(e) => debug!(%alias, "trailing-slash alias skipped: {e}"),
        }
    }

    fn count(&self, scope: ScopeId) -> usize {
        let nested: usize = self.scopes[scope]
            .children
            .values()
            .map(|&child| self.count(child))
            .sum();
        self.scopes[scope].routes + nested
    }
}

impl ScopeState {
    fn new(prefix: String, parent: Option<ScopeId>) -> Self {
        Self {
            prefix,
            parent,
            middleware: Vec::new(),
            children: HashMap::new(),
            routes: 0,
        }
    }
}

impl Endpoint {
    fn allow(&self) -> String {
        self.methods.keys()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Joins a scope prefix and a route path. `/` (or `""`) inside a scope is the
/// prefix itself; a missing leading `/` is added.
fn join(prefix: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return if prefix.is_empty() { "/".to_owned() } else { prefix.to_owned() };
    }
    format!("{prefix}/{path}")
}
