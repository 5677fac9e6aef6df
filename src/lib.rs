//! # hostmux
//!
//! The request-routing layer of an API gateway: one routing tree per virtual
//! host, a wildcard tree for everything else, middleware composed per route,
//! and registration that stays safe while the server is already serving.
//!
//! ## The contract
//!
//! - Every subsystem (plugins, the admin API, the proxy engine) registers
//!   through [`Mux`], and groups through [`ScopeMux`]. Nothing holds a tree.
//! - The host comes from `X-Forwarded-Host`, then `Forwarded` (RFC 7239),
//!   then the request's own host. See [`resolve_host`].
//! - Unknown hosts use the `"*"` tree. Unmatched paths get the not-found
//!   handler. Routing never fails.
//! - Middleware is composed at registration: scope middleware outermost in
//!   call order, route middleware innermost. Not retroactive.
//!
//! What hostmux leaves to its collaborators: TLS, proxying upstream, the
//! plugin event bus, and the middleware implementations themselves.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hostmux::{MuxExt, Request, Response, Router, ScopeMuxExt, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hostmux::Error> {
//!     let router = Arc::new(Router::new());
//!
//!     router
//!         .get("*", "/", home, [])
//!         .group("api.example.com", "/users", |r| {
//!             r.get("/{id}", get_user, []);
//!         });
//!
//!     Server::bind("0.0.0.0:3000")?.serve(router).await
//! }
//!
//! async fn home(_req: Request) -> &'static str {
//!     "welcome"
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//! ```

mod error;
mod handler;
mod host;
mod method;
mod request;
mod response;
mod router;
mod server;
mod table;
mod tree;

pub mod config;
pub mod logging;
pub mod middleware;

pub use config::Config;
pub use error::Error;
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
pub use host::{parse_forwarded, resolve_host, Forwarded};
pub use method::Method;
pub use middleware::{Middleware, Next};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{
    not_found, Mux, MuxExt, Router, RouterOptions, Routes, ScopeMux, ScopeMuxExt,
};
pub use server::Server;
pub use table::WILDCARD;
