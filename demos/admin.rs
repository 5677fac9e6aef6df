//! An admin API wired through hostmux: global middleware, public routes, a
//! guarded group, and a plugin that registers its own routes through [`Routes`].
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example admin
//!
//! Try:
//!   curl http://localhost:8081/
//!   curl http://localhost:8081/apis                       # 401
//!   curl -H 'authorization: Bearer x' http://localhost:8081/apis/users
//!   curl -H 'x-forwarded-host: api.example.com' http://localhost:8081/
//!   curl http://localhost:8081/credentials/basic_auth/alice

use std::sync::Arc;

use hostmux::middleware::{self, Next};
use hostmux::{
    Config, Mux, MuxExt, Request, Response, Router, Routes, ScopeMuxExt, Server, logging,
};
use http::StatusCode;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), hostmux::Error> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };
    logging::init(&config.log_level)?;

    let router = Arc::new(Router::new());

    router
        .use_middleware("*", [request_log()])
        .get("*", "/", home, [])
        .post("*", "/login", login, [])
        .group("*", "/apis", |r| {
            r.use_middleware([require_token()]);
            r.get("/", list_apis, []);
            r.get("/{name}", get_api, []);
            r.delete("/{name}", |_req: Request| async { StatusCode::NO_CONTENT }, []);
        })
        .get("api.example.com", "/", |_req: Request| async { "api host" }, []);

    router.install(&BasicAuthPlugin);

    info!(hosts = ?router.hosts(), routes = router.route_count(), "routes ready");

    Server::from_config(&config).serve(router).await
}

async fn home(_req: Request) -> &'static str {
    "Welcome to the admin API"
}

async fn login(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }
    Response::json(br#"{"token":"demo"}"#.to_vec())
}

async fn list_apis(_req: Request) -> Response {
    Response::json(b"[]".to_vec())
}

async fn get_api(req: Request) -> Response {
    let name = req.param("name").unwrap_or("unknown");
    Response::json(format!(r#"{{"name":"{name}"}}"#).into_bytes())
}

fn request_log() -> middleware::Middleware {
    middleware::from_fn(|req: Request, next: Next| async move {
        let method = req.method().clone();
        let path = req.path().to_owned();
        let res = next.run(req).await;
        info!(%method, %path, status = res.status_code().as_u16(), "request");
        res
    })
}

fn require_token() -> middleware::Middleware {
    middleware::from_fn(|req: Request, next: Next| async move {
        if req.header("authorization").is_none() {
            return Response::status(StatusCode::UNAUTHORIZED);
        }
        next.run(req).await
    })
}

/// Stands in for a plugin that owns a credential store.
struct BasicAuthPlugin;

impl Routes for BasicAuthPlugin {
    fn register(&self, mux: &dyn Mux) {
        mux.group("*", "/credentials/basic_auth", |r| {
            r.get("/", |_req: Request| async { Response::json(b"[]".to_vec()) }, []);
            r.get("/{username}", |req: Request| async move {
                req.param("username").unwrap_or_default().to_owned()
            }, []);
        });
    }
}
