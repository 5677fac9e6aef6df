//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Uri};

/// An incoming HTTP request with its body already collected.
///
/// Build one from any `http::Request<Bytes>`:
///
/// ```rust
/// use bytes::Bytes;
/// use hostmux::Request;
///
/// let req: Request = http::Request::get("/users/42")
///     .header("host", "api.example.com")
///     .body(Bytes::new())
///     .unwrap()
///     .into();
/// assert_eq!(req.host(), Some("api.example.com"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn new(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            remote_addr: None,
        }
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &http::Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The host the client addressed: the `Host` header, or the URI authority
    /// for HTTP/2 requests that carry none. The port, if any, is kept.
    pub fn host(&self) -> Option<&str> {
        self.header("host")
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        Self::new(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_prefers_header_over_authority() {
        let req: Request = http::Request::get("http://authority.test/x")
            .header("Host", "header.test:8080")
            .body(Bytes::new())
            .unwrap()
            .into();
        assert_eq!(req.host(), Some("header.test:8080"));
    }

    #[test]
    fn host_falls_back_to_authority() {
        let req: Request = http::Request::get("http://authority.test/x")
            .body(Bytes::new())
            .unwrap()
            .into();
        assert_eq!(req.host(), Some("authority.test"));
        assert_eq!(req.path(), "/x");
    }

    #[test]
    fn missing_host_is_none() {
        let req: Request = http::Request::get("/x").body(Bytes::new()).unwrap().into();
        assert_eq!(req.host(), None);
        assert_eq!(req.param("id"), None);
    }
}
