//! Middleware layer.
//!
//! A [`Middleware`] is a constructor: it takes the handler it wraps and
//! returns a new handler. That is the whole contract. Logging, recovery,
//! authentication and compression all fit in it, and none of them live in
//! this crate.
//!
//! Most middleware is easiest to write with [`from_fn`]:
//!
//! ```rust
//! use hostmux::middleware::{self, Next};
//! use hostmux::{Request, Response};
//! use http::StatusCode;
//!
//! let require_token = middleware::from_fn(|req: Request, next: Next| async move {
//!     if req.header("authorization").is_none() {
//!         return Response::status(StatusCode::UNAUTHORIZED);
//!     }
//!     next.run(req).await
//! });
//! ```
//!
//! # Ordering
//!
//! Scope middleware (`use_middleware`) wraps outermost, in call order, and
//! only applies to routes registered after the call. Route middleware nests
//! inside it, first element outermost, and is closest to the handler.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::IntoResponse;

type Constructor = dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static;

/// Wraps a handler, produces a handler.
#[derive(Clone)]
pub struct Middleware(Arc<Constructor>);

impl Middleware {
    /// Raw constructor form. Prefer [`from_fn`] unless the wrapper needs its
    /// own [`ErasedHandler`] type.
    pub fn new<F>(constructor: F) -> Self
    where
        F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        Self(Arc::new(constructor))
    }

    pub fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (self.0)(next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// Folds `chain` around `handler`: the first element ends up outermost.
pub(crate) fn compose<'a, I>(handler: BoxedHandler, chain: I) -> BoxedHandler
where
    I: DoubleEndedIterator<Item = &'a Middleware>,
{
    chain.rev().fold(handler, |inner, m| m.wrap(inner))
}

/// The rest of the chain, handed to a [`from_fn`] middleware.
#[derive(Clone)]
pub struct Next(BoxedHandler);

impl Next {
    /// Runs the wrapped handler (and any layers inside this one).
    pub fn run(self, req: Request) -> BoxFuture {
        self.0.call(req)
    }
}

/// Builds a [`Middleware`] from an async function of `(Request, Next)`.
pub fn from_fn<F, Fut, R>(f: F) -> Middleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    let f = Arc::new(f);
    Middleware::new(move |next: BoxedHandler| -> BoxedHandler {
        Arc::new(FromFn { f: Arc::clone(&f), next })
    })
}

struct FromFn<F> {
    f: Arc<F>,
    next: BoxedHandler,
}

impl<F, Fut, R> ErasedHandler for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.f)(req, Next(Arc::clone(&self.next)));
        Box::pin(async move { fut.await.into_response() })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::handler::Handler;
    use crate::response::Response;

    fn tag(label: &'static str) -> Middleware {
        from_fn(move |req: Request, next: Next| async move {
            let inner = next.run(req).await;
            let body = String::from_utf8_lossy(inner.body()).into_owned();
            Response::text(format!("{label}({body})"))
        })
    }

    #[tokio::test]
    async fn compose_puts_first_middleware_outermost() {
        let handler = (|_req: Request| async { "h" }).into_boxed_handler();
        let chain = [tag("a"), tag("b")];
        let composed = compose(handler, chain.iter());

        let req = http::Request::get("/").body(Bytes::new()).unwrap().into();
        let res = composed.call(req).await;
        assert_eq!(res.body(), b"a(b(h))");
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let handler = (|_req: Request| async { "unreachable" }).into_boxed_handler();
        let deny = from_fn(|_req: Request, _next: Next| async {
            http::StatusCode::FORBIDDEN
        });
        let composed = deny.wrap(handler);

        let req = http::Request::get("/").body(Bytes::new()).unwrap().into();
        assert_eq!(composed.call(req).await.status_code(), http::StatusCode::FORBIDDEN);
    }
}
