//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! Each routing tree holds handlers of *different* concrete types, and
//! middleware wraps them in further types again. Everything is therefore
//! stored behind a trait object:
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ mux.get("*", "/", hello, [])
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← BoxedHandler
//!        ↓ middleware.wrap(handler)                ← once, at registration
//! Arc<FromFn { f, next: BoxedHandler }>            ← still a BoxedHandler
//!        ↓
//! handler.call(req) at request time                ← one vtable dispatch per layer
//! ```
//!
//! Middleware is composed when the route is registered, not per request, so
//! the hot path is one `Arc` clone plus one virtual call per layer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// `Send + 'static` lets tokio move the future across worker threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Dispatch interface shared by handlers and the layers middleware builds
/// around them. Implement it directly only when writing a raw
/// [`Middleware`](crate::middleware::Middleware) constructor.
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` (or closure returning a future)
/// with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
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
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Holds a concrete handler `F` and bridges it to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;

    #[tokio::test]
    async fn erased_handler_converts_return_value() {
        let handler = (|_req: Request| async { StatusCode::ACCEPTED }).into_boxed_handler();
        let req = http::Request::get("/").body(Bytes::new()).unwrap().into();
        let res = handler.call(req).await;
        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
    }
}
